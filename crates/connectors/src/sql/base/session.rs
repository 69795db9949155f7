use crate::sql::base::error::{ConnectorError, DbError};
use async_trait::async_trait;
use model::records::binding::BindingRow;

/// A single destination connection used by one loader worker.
///
/// At most one transaction is open at a time. A statement prepared with
/// [`prepare`](InsertSession::prepare) lives until the transaction ends.
#[async_trait]
pub trait InsertSession: Send {
    async fn begin(&mut self) -> Result<(), DbError>;

    /// Prepares the multi-row insert for batches of exactly `rows` rows,
    /// replacing any statement prepared earlier in the transaction.
    async fn prepare(&mut self, rows: usize) -> Result<(), DbError>;

    /// Executes the prepared insert and returns how many rows were actually
    /// inserted. Rows whose key already exists are dropped silently.
    async fn insert(&mut self, rows: &[BindingRow]) -> Result<u64, DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;
}

/// Opens one [`InsertSession`] per worker.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: InsertSession + 'static;

    async fn open(&self) -> Result<Self::Session, ConnectorError>;
}
