use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any Postgres driver error.
    #[error("SQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// The row count of a batch does not match the prepared statement.
    #[error("Statement prepared for {prepared} rows, got a batch of {rows}")]
    BatchShape { prepared: usize, rows: usize },

    /// An insert was attempted before a statement was prepared.
    #[error("No statement prepared in the current transaction")]
    NotPrepared,

    /// Writing rows to the database failed at the application level.
    #[error("Write error: {0}")]
    Write(String),
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Postgres connection failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}
