use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use maestro_core::error::{MaestroError, Result};

use crate::ExperimentTracker;

const API_BASE_PATH: &str = "/api/2.0/mlflow";

/// MLflow tracking server client over its REST API.
pub struct MlflowClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlflowClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, API_BASE_PATH, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| MaestroError::Tracking(format!("MLflow request failed: {}", e)))?;
        read_response(resp).await
    }

    async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let _: serde_json::Value = self.post(path, body).await?;
        Ok(())
    }
}

async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(MaestroError::Tracking(error_message(status.as_u16(), &body)));
    }

    let trimmed = body.trim();
    let body = if trimmed.is_empty() { "{}" } else { trimmed };
    serde_json::from_str(body)
        .map_err(|e| MaestroError::Tracking(format!("Failed to parse MLflow response: {}", e)))
}

/// Prefer MLflow's `{error_code, message}` body; fall back to the raw text.
fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => format!("{}: {}", err.error_code, err.message),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MaestroError::Tracking(format!("{} cannot be empty", what)));
    }
    Ok(())
}

// -- Wire types --

#[derive(Serialize)]
struct CreateExperimentRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    experiment_id: &'a str,
    start_time: i64,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: RunDto,
}

#[derive(Deserialize)]
struct RunDto {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
}

#[derive(Serialize)]
struct LogParamRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct LogMetricRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: f64,
    timestamp: i64,
}

#[derive(Serialize)]
struct UpdateRunRequest<'a> {
    run_id: &'a str,
    status: &'a str,
    end_time: i64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error_code: String,
    message: String,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ExperimentTracker for MlflowClient {
    fn get_experiment_by_name(&self, name: &str) -> BoxFuture<'_, Result<String>> {
        let name = name.to_string();
        Box::pin(async move {
            require(&name, "Experiment name")?;
            let resp = self
                .http
                .get(self.url("experiments/get-by-name"))
                .query(&[("experiment_name", name.as_str())])
                .send()
                .await
                .map_err(|e| MaestroError::Tracking(format!("MLflow request failed: {}", e)))?;
            let body: GetExperimentResponse = read_response(resp).await?;
            Ok(body.experiment.experiment_id)
        })
    }

    fn create_experiment(&self, name: &str) -> BoxFuture<'_, Result<String>> {
        let name = name.to_string();
        Box::pin(async move {
            require(&name, "Experiment name")?;
            let body: CreateExperimentResponse = self
                .post("experiments/create", &CreateExperimentRequest { name: &name })
                .await?;
            debug!(experiment = %name, id = %body.experiment_id, "Created MLflow experiment");
            Ok(body.experiment_id)
        })
    }

    fn create_run(&self, experiment_id: &str) -> BoxFuture<'_, Result<String>> {
        let experiment_id = experiment_id.to_string();
        Box::pin(async move {
            require(&experiment_id, "Experiment ID")?;
            let body: CreateRunResponse = self
                .post(
                    "runs/create",
                    &CreateRunRequest {
                        experiment_id: &experiment_id,
                        start_time: now_ms(),
                    },
                )
                .await?;
            Ok(body.run.info.run_id)
        })
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> BoxFuture<'_, Result<()>> {
        let (run_id, key, value) = (run_id.to_string(), key.to_string(), value.to_string());
        Box::pin(async move {
            require(&run_id, "Run ID")?;
            require(&key, "Param key")?;
            self.post_empty(
                "runs/log-parameter",
                &LogParamRequest {
                    run_id: &run_id,
                    key: &key,
                    value: &value,
                },
            )
            .await
        })
    }

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> BoxFuture<'_, Result<()>> {
        let (run_id, key) = (run_id.to_string(), key.to_string());
        Box::pin(async move {
            require(&run_id, "Run ID")?;
            require(&key, "Metric key")?;
            self.post_empty(
                "runs/log-metric",
                &LogMetricRequest {
                    run_id: &run_id,
                    key: &key,
                    value,
                    timestamp: now_ms(),
                },
            )
            .await
        })
    }

    fn update_run(&self, run_id: &str, status: &str) -> BoxFuture<'_, Result<()>> {
        let (run_id, status) = (run_id.to_string(), status.to_string());
        Box::pin(async move {
            require(&run_id, "Run ID")?;
            require(&status, "Status")?;
            self.post_empty(
                "runs/update",
                &UpdateRunRequest {
                    run_id: &run_id,
                    status: &status,
                    end_time: now_ms(),
                },
            )
            .await
        })
    }
}
