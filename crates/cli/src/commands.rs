use clap::{Args, Subcommand};
use engine_config::settings::{
    DEFAULT_INSERT_SIZE, DEFAULT_TABLE, DEFAULT_TX_SIZE, DEFAULT_WORKERS, IngestSettings,
};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Load a CSV activity export (plain or gzip) into Postgres
    Load(LoadArgs),

    /// Check that the database answers a trivial query
    TestConn {
        /// Postgres connection URL
        #[arg(short, long, env = "PLOAD_DATABASE_URL", hide_env_values = true)]
        conn: String,
    },
}

#[derive(Args)]
pub struct LoadArgs {
    /// Export file to load; standard input when omitted
    pub file: Option<PathBuf>,

    /// Postgres connection URL
    #[arg(short, long, env = "PLOAD_DATABASE_URL", hide_env_values = true)]
    pub conn: String,

    /// Number of parallel workers, each with its own connection
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Import id stored with every row; 0 stores NULL
    #[arg(short, long, default_value_t = 0)]
    pub import_id: i64,

    /// Destination table, optionally schema-qualified
    #[arg(short, long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Rows per multi-row insert statement
    #[arg(short = 'm', long, default_value_t = DEFAULT_INSERT_SIZE)]
    pub insert_size: usize,

    /// Records per transaction
    #[arg(short = 'x', long, default_value_t = DEFAULT_TX_SIZE)]
    pub tx_size: usize,

    /// Print the summary as JSON instead of a text line
    #[arg(long)]
    pub json: bool,
}

impl LoadArgs {
    pub fn settings(&self) -> IngestSettings {
        IngestSettings::default()
            .with_import_id((self.import_id != 0).then_some(self.import_id))
            .with_table(&self.table)
            .with_workers(self.workers)
            .with_insert_size(self.insert_size)
            .with_tx_size(self.tx_size)
    }
}
