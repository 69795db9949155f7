use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportGenerationError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
