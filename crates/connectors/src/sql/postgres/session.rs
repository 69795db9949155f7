use crate::sql::{
    base::{
        error::{ConnectorError, DbError},
        session::{InsertSession, SessionFactory},
    },
    postgres::{params::PgBatchParams, query, utils::connect_client},
};
use async_trait::async_trait;
use model::records::binding::BindingRow;
use tokio_postgres::{Client, Config, Statement};
use tracing::debug;

/// Opens one Postgres connection per loader worker.
#[derive(Clone)]
pub struct PgSessionFactory {
    config: Config,
    table: String,
    import_id: Option<i64>,
}

impl PgSessionFactory {
    pub fn new(config: Config, table: impl Into<String>, import_id: Option<i64>) -> Self {
        PgSessionFactory {
            config,
            table: table.into(),
            import_id,
        }
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    type Session = PgSession;

    async fn open(&self) -> Result<PgSession, ConnectorError> {
        let client = connect_client(&self.config).await?;
        Ok(PgSession::new(client, self.table.clone(), self.import_id))
    }
}

struct Prepared {
    rows: usize,
    statement: Statement,
}

pub struct PgSession {
    client: Client,
    table: String,
    import_id: Option<i64>,
    prepared: Option<Prepared>,
}

impl PgSession {
    pub fn new(client: Client, table: String, import_id: Option<i64>) -> Self {
        PgSession {
            client,
            table,
            import_id,
            prepared: None,
        }
    }
}

#[async_trait]
impl InsertSession for PgSession {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn prepare(&mut self, rows: usize) -> Result<(), DbError> {
        let sql = query::insert_batch(&self.table, rows);
        debug!(rows, sql = %sql, "Preparing insert statement");

        // Dropping the previous statement closes it on the server.
        self.prepared = None;
        let statement = self.client.prepare(&sql).await?;
        self.prepared = Some(Prepared { rows, statement });
        Ok(())
    }

    async fn insert(&mut self, rows: &[BindingRow]) -> Result<u64, DbError> {
        let prepared = self.prepared.as_ref().ok_or(DbError::NotPrepared)?;
        if prepared.rows != rows.len() {
            return Err(DbError::BatchShape {
                prepared: prepared.rows,
                rows: rows.len(),
            });
        }

        let params = PgBatchParams::new(&self.import_id, rows);
        let row = self
            .client
            .query_one(&prepared.statement, params.as_refs())
            .await?;
        let inserted: i64 = row.try_get(0)?;
        Ok(u64::try_from(inserted).unwrap_or_default())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.prepared = None;
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.prepared = None;
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
