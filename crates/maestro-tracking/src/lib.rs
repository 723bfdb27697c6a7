//! Experiment tracking: a sink for per-run parameters and metrics, and a
//! detached reporter that feeds it after a workflow finishes.

pub mod mlflow;
pub mod reporter;

pub use mlflow::MlflowClient;
pub use reporter::{input_preview, metric_key, TrackingReporter};

use futures::future::BoxFuture;

use maestro_core::error::Result;

/// An experiment-tracking backend.
pub trait ExperimentTracker: Send + Sync + 'static {
    /// Id of the experiment called `name`. Fails if it does not exist.
    fn get_experiment_by_name(&self, name: &str) -> BoxFuture<'_, Result<String>>;

    /// Create an experiment and return its id.
    fn create_experiment(&self, name: &str) -> BoxFuture<'_, Result<String>>;

    /// Open a run under `experiment_id` and return its id.
    fn create_run(&self, experiment_id: &str) -> BoxFuture<'_, Result<String>>;

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> BoxFuture<'_, Result<()>>;

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> BoxFuture<'_, Result<()>>;

    /// Set the terminal status of a run, e.g. `FINISHED`.
    fn update_run(&self, run_id: &str, status: &str) -> BoxFuture<'_, Result<()>>;
}
