use engine_config::settings::IngestSettings;

/// Batching limits applied by every worker of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Rows per multi-row insert.
    pub insert_size: usize,

    /// Records after which the open transaction is committed.
    pub tx_size: usize,
}

impl WorkerConfig {
    pub fn new(insert_size: usize, tx_size: usize) -> Self {
        Self {
            insert_size,
            tx_size,
        }
    }
}

impl From<&IngestSettings> for WorkerConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self::new(settings.insert_size, settings.tx_size)
    }
}
