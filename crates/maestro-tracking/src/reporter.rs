use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use maestro_core::config::TrackingConfig;
use maestro_core::error::Result;
use maestro_core::types::WorkflowResult;

use crate::mlflow::MlflowClient;
use crate::ExperimentTracker;

const PREVIEW_CHARS: usize = 100;

/// Metric key prefix for a step: lower-cased, spaces replaced by underscores.
pub fn metric_key(agent_name: &str) -> String {
    agent_name.to_lowercase().replace(' ', "_")
}

/// First 100 characters of `input`, with `...` appended when truncated.
pub fn input_preview(input: &str) -> String {
    if input.chars().count() > PREVIEW_CHARS {
        let head: String = input.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        input.to_string()
    }
}

/// Sends workflow summaries to an experiment tracker without blocking the caller.
///
/// Reporting never fails the workflow: errors are logged and dropped.
#[derive(Clone)]
pub struct TrackingReporter {
    tracker: Arc<dyn ExperimentTracker>,
    experiment_name: String,
}

impl TrackingReporter {
    pub fn new(tracker: Arc<dyn ExperimentTracker>, experiment_name: impl Into<String>) -> Self {
        Self {
            tracker,
            experiment_name: experiment_name.into(),
        }
    }

    /// MLflow reporter for `config`, or `None` when tracking is disabled.
    pub fn from_config(config: &TrackingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self::new(
            Arc::new(MlflowClient::new(config.base_url.clone())),
            config.experiment_name.clone(),
        ))
    }

    /// Log a chain run in the background.
    pub fn report_chain(&self, input: &str, result: &WorkflowResult) -> JoinHandle<()> {
        let tracker = Arc::clone(&self.tracker);
        let experiment = self.experiment_name.clone();
        let input = input.to_string();
        let result = result.clone();

        tokio::spawn(async move {
            if let Err(e) = log_chain(tracker.as_ref(), &experiment, &input, &result).await {
                warn!(error = %e, experiment = %experiment, "Failed to log workflow run");
            }
        })
    }
}

async fn log_chain(
    tracker: &dyn ExperimentTracker,
    experiment: &str,
    input: &str,
    result: &WorkflowResult,
) -> Result<()> {
    let experiment_id = match tracker.get_experiment_by_name(experiment).await {
        Ok(id) => id,
        Err(e) => {
            debug!(error = %e, experiment, "Experiment lookup failed, creating it");
            tracker.create_experiment(experiment).await?
        }
    };
    let run_id = tracker.create_run(&experiment_id).await?;

    let params = [
        ("input_preview".to_string(), input_preview(input)),
        (
            "agent_count".to_string(),
            result.agent_results.len().to_string(),
        ),
    ];
    for (key, value) in &params {
        if let Err(e) = tracker.log_param(&run_id, key, value).await {
            debug!(error = %e, key = %key, "Param not logged");
        }
    }

    let mut metrics = vec![
        ("total_tokens".to_string(), result.total_tokens as f64),
        (
            "total_execution_time_ms".to_string(),
            result.execution_time_ms as f64,
        ),
    ];
    for step in &result.agent_results {
        let key = metric_key(&step.agent_name);
        metrics.push((format!("{}_tokens", key), step.tokens_used as f64));
        metrics.push((
            format!("{}_execution_time_ms", key),
            step.execution_time_ms as f64,
        ));
    }
    for (key, value) in &metrics {
        if let Err(e) = tracker.log_metric(&run_id, key, *value).await {
            debug!(error = %e, key = %key, "Metric not logged");
        }
    }

    tracker.update_run(&run_id, "FINISHED").await?;
    info!(run_id = %run_id, experiment_id = %experiment_id, "Logged workflow run");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;

    use maestro_core::error::MaestroError;
    use maestro_core::types::StepRecord;

    use super::*;

    #[derive(Default)]
    struct RecordingTracker {
        known_experiment: bool,
        fail_runs: bool,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingTracker {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ExperimentTracker for RecordingTracker {
        fn get_experiment_by_name(&self, name: &str) -> BoxFuture<'_, Result<String>> {
            self.record(format!("get:{}", name));
            let known = self.known_experiment;
            Box::pin(async move {
                if known {
                    Ok("exp-1".to_string())
                } else {
                    Err(MaestroError::Tracking("RESOURCE_DOES_NOT_EXIST".into()))
                }
            })
        }

        fn create_experiment(&self, name: &str) -> BoxFuture<'_, Result<String>> {
            self.record(format!("create:{}", name));
            Box::pin(async { Ok("exp-new".to_string()) })
        }

        fn create_run(&self, experiment_id: &str) -> BoxFuture<'_, Result<String>> {
            self.record(format!("run:{}", experiment_id));
            let fail = self.fail_runs;
            Box::pin(async move {
                if fail {
                    Err(MaestroError::Tracking("HTTP 500: boom".into()))
                } else {
                    Ok("run-1".to_string())
                }
            })
        }

        fn log_param(&self, _run_id: &str, key: &str, value: &str) -> BoxFuture<'_, Result<()>> {
            self.record(format!("param:{}={}", key, value));
            Box::pin(async { Ok(()) })
        }

        fn log_metric(&self, _run_id: &str, key: &str, value: f64) -> BoxFuture<'_, Result<()>> {
            self.record(format!("metric:{}={}", key, value));
            Box::pin(async { Ok(()) })
        }

        fn update_run(&self, run_id: &str, status: &str) -> BoxFuture<'_, Result<()>> {
            self.record(format!("update:{}={}", run_id, status));
            Box::pin(async { Ok(()) })
        }
    }

    fn sample_result() -> WorkflowResult {
        WorkflowResult::from_steps(
            vec![
                StepRecord {
                    agent_name: "Classifier".into(),
                    input: "I was charged twice".into(),
                    output: "Category: billing".into(),
                    tokens_used: 5,
                    execution_time_ms: 120,
                },
                StepRecord {
                    agent_name: "Billing Specialist".into(),
                    input: "Category: billing".into(),
                    output: "Refund issued.".into(),
                    tokens_used: 4,
                    execution_time_ms: 80,
                },
            ],
            250,
        )
    }

    #[test]
    fn test_metric_key() {
        assert_eq!(metric_key("Classifier"), "classifier");
        assert_eq!(metric_key("Billing Specialist"), "billing_specialist");
    }

    #[test]
    fn test_input_preview() {
        assert_eq!(input_preview("short"), "short");
        let exact = "x".repeat(100);
        assert_eq!(input_preview(&exact), exact);
        let long = "y".repeat(150);
        let preview = input_preview(&long);
        assert_eq!(preview.len(), 103);
        assert!(preview.ends_with("..."));
    }

    #[tokio::test]
    async fn test_report_chain_logs_everything() {
        let tracker = Arc::new(RecordingTracker {
            known_experiment: true,
            ..Default::default()
        });
        let reporter = TrackingReporter::new(tracker.clone(), "customer-support-triage");

        reporter
            .report_chain("I was charged twice", &sample_result())
            .await
            .unwrap();

        assert_eq!(
            tracker.calls(),
            vec![
                "get:customer-support-triage",
                "run:exp-1",
                "param:input_preview=I was charged twice",
                "param:agent_count=2",
                "metric:total_tokens=9",
                "metric:total_execution_time_ms=250",
                "metric:classifier_tokens=5",
                "metric:classifier_execution_time_ms=120",
                "metric:billing_specialist_tokens=4",
                "metric:billing_specialist_execution_time_ms=80",
                "update:run-1=FINISHED",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_experiment_is_created() {
        let tracker = Arc::new(RecordingTracker::default());
        let reporter = TrackingReporter::new(tracker.clone(), "demo");
        reporter.report_chain("hi", &sample_result()).await.unwrap();

        let calls = tracker.calls();
        assert_eq!(calls[0], "get:demo");
        assert_eq!(calls[1], "create:demo");
        assert_eq!(calls[2], "run:exp-new");
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let tracker = Arc::new(RecordingTracker {
            known_experiment: true,
            fail_runs: true,
            ..Default::default()
        });
        let reporter = TrackingReporter::new(tracker.clone(), "demo");

        // The task completes normally even though the run could not be created.
        reporter.report_chain("hi", &sample_result()).await.unwrap();
        assert_eq!(tracker.calls().len(), 2);
    }

    #[test]
    fn test_disabled_config() {
        let config = TrackingConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(TrackingReporter::from_config(&config).is_none());
        assert!(TrackingReporter::from_config(&TrackingConfig::default()).is_some());
    }
}
