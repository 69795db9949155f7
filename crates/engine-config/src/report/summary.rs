use crate::error::ReportGenerationError;
use model::records::tally::Tally;
use serde::Serialize;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of a successful load run.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub records: Tally,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Memory held by the loader process at the end of the run, in bytes.
    #[serde(rename = "memory_bytes")]
    pub memory: u64,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

impl IngestSummary {
    pub fn new(records: Tally, duration: Duration, memory: u64) -> Self {
        Self {
            records,
            duration,
            memory,
        }
    }

    pub fn to_text(&self) -> String {
        format!(
            "Total {}, affected {}, time {:?}, memory {:.3}Mb",
            self.records.processed,
            self.records.affected,
            self.duration,
            self.memory as f64 / BYTES_PER_MB
        )
    }

    pub fn to_json(&self) -> Result<String, ReportGenerationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Resident memory of the current process in bytes, or 0 when the platform
/// does not expose it.
pub fn process_memory() -> u64 {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            warn!("Could not determine the current process id: {err}");
            return 0;
        }
    };

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    match sys.process(pid) {
        Some(process) => process.memory(),
        None => {
            warn!("Could not read process memory");
            0
        }
    }
}
