use thiserror::Error;

/// Errors raised when validating load settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Insert size must be between 1 and {max}, got {got}")]
    InsertSize { got: usize, max: usize },

    #[error("Transaction size must be at least 1")]
    TransactionSize,

    /// The destination table is spliced into SQL, so only plain identifiers pass.
    #[error("Invalid destination table name: '{0}'")]
    TableName(String),
}
