use connectors::sql::base::error::{ConnectorError, DbError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Failed to decode record {record}: {source}")]
    Decode {
        record: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Record hand-off cancelled")]
    Cancelled,

    #[error("The record queue was closed unexpectedly.")]
    ChannelClosed,
}

/// Worker failures. Everything except `Cancelled` is fatal for the run.
#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Worker {worker} failed to connect: {source}")]
    Connect {
        worker: usize,
        #[source]
        source: ConnectorError,
    },

    #[error("Worker {worker} failed to begin a transaction: {source}")]
    Begin {
        worker: usize,
        #[source]
        source: DbError,
    },

    #[error("Worker {worker} failed to prepare an insert for {rows} rows: {source}")]
    Prepare {
        worker: usize,
        rows: usize,
        #[source]
        source: DbError,
    },

    #[error("Worker {worker} failed to insert a batch of {rows} rows: {source}")]
    Insert {
        worker: usize,
        rows: usize,
        #[source]
        source: DbError,
    },

    #[error("Worker {worker} failed to commit: {source}")]
    Commit {
        worker: usize,
        #[source]
        source: DbError,
    },

    #[error("Worker {worker} cancelled")]
    Cancelled { worker: usize },
}

impl ConsumerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConsumerError::Cancelled { .. })
    }
}

/// The failure that ended a run, tagged with the side that raised it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Record source failed: {0}")]
    Producer(#[from] ProducerError),

    #[error("Loader failed: {0}")]
    Consumer(#[from] ConsumerError),
}
