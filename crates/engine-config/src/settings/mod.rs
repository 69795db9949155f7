use crate::settings::error::SettingsError;
use connectors::sql::postgres::query::MAX_ROWS_PER_STATEMENT;

pub mod error;

pub const DEFAULT_TABLE: &str = "marketo.activities";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_INSERT_SIZE: usize = 2;
pub const DEFAULT_TX_SIZE: usize = 25_000;

/// Settings for one load run. Read-only once the run starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestSettings {
    /// Lineage id written with every row; `None` stores NULL.
    pub import_id: Option<i64>,

    /// Destination table, optionally schema-qualified.
    pub table: String,

    /// Number of parallel workers, each with its own connection.
    pub workers: usize,

    /// Rows per multi-row insert statement.
    pub insert_size: usize,

    /// Records per transaction. Commits happen on batch boundaries, so a
    /// transaction can overshoot this by up to `insert_size - 1` records.
    pub tx_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            import_id: None,
            table: DEFAULT_TABLE.to_string(),
            workers: DEFAULT_WORKERS,
            insert_size: DEFAULT_INSERT_SIZE,
            tx_size: DEFAULT_TX_SIZE,
        }
    }
}

impl IngestSettings {
    pub fn with_import_id(mut self, import_id: Option<i64>) -> Self {
        self.import_id = import_id;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_insert_size(mut self, insert_size: usize) -> Self {
        self.insert_size = insert_size;
        self
    }

    pub fn with_tx_size(mut self, tx_size: usize) -> Self {
        self.tx_size = tx_size;
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.workers == 0 {
            return Err(SettingsError::NoWorkers);
        }
        if self.insert_size == 0 || self.insert_size > MAX_ROWS_PER_STATEMENT {
            return Err(SettingsError::InsertSize {
                got: self.insert_size,
                max: MAX_ROWS_PER_STATEMENT,
            });
        }
        if self.tx_size == 0 {
            return Err(SettingsError::TransactionSize);
        }
        if !is_table_name(&self.table) {
            return Err(SettingsError::TableName(self.table.clone()));
        }
        Ok(())
    }
}

/// Accepts `table` or `schema.table` made of unquoted SQL identifiers.
fn is_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2 && parts.iter().all(|part| is_identifier(part))
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
