use engine_config::settings::error::SettingsError;
use engine_processing::error::PipelineError;
use thiserror::Error;

/// Top-level errors for a load run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The run was rejected before anything was started.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// First fatal failure raised by the record source or a worker.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Shutdown was requested before every worker reported.
    #[error("Load cancelled")]
    Cancelled,

    /// An error occurred while joining a task.
    /// This usually indicates that the task panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
