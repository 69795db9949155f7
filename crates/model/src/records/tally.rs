use serde::Serialize;
use std::ops::{Add, AddAssign};

/// Record counters for one worker, or the sum over all workers of a run.
///
/// `affected` never exceeds `processed`: rows whose global identifier
/// already exists at the destination are processed but not inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub processed: u64,
    pub affected: u64,
}

impl Tally {
    pub fn new(processed: u64, affected: u64) -> Self {
        Tally {
            processed,
            affected,
        }
    }

    /// Accounts for one executed insert batch.
    pub fn record_batch(&mut self, rows: usize, affected: u64) {
        self.processed += rows as u64;
        self.affected += affected;
    }

    /// Rows that were skipped because their key was already present.
    pub fn skipped(&self) -> u64 {
        self.processed.saturating_sub(self.affected)
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Tally) -> Tally {
        Tally {
            processed: self.processed + rhs.processed,
            affected: self.affected + rhs.affected,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Tally) {
        *self = *self + rhs;
    }
}
