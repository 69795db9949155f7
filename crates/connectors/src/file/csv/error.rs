use model::error::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Failed to open input '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Malformed record on line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: RecordError,
    },
}
