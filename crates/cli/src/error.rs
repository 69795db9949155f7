use connectors::{file::csv::error::FileError, sql::base::error::ConnectorError};
use engine_config::{error::ReportGenerationError, settings::error::SettingsError};
use engine_runtime::error::IngestError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid load settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to open the input: {0}")]
    Input(#[from] FileError),

    #[error("Database connection failed: {0}")]
    Connection(#[from] ConnectorError),

    #[error("Failed to run the load: {0}")]
    Runner(#[from] IngestError),

    #[error("Failed to render the summary: {0}")]
    Report(#[from] ReportGenerationError),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

impl CliError {
    /// Whether the load had started writing when it failed.
    pub fn after_start(&self) -> bool {
        matches!(
            self,
            CliError::ShutdownRequested
                | CliError::Runner(IngestError::Pipeline(_) | IngestError::Cancelled)
        )
    }
}
