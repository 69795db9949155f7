use model::records::activity::ActivityRecord;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Creates the bounded hand-off between the record source and the workers.
///
/// Sends wait while `capacity` records are queued. The queue reports end of
/// input to every worker once the sender is dropped and drained.
pub fn channel(capacity: usize) -> (mpsc::Sender<ActivityRecord>, RecordQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        RecordQueue {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Receiving side of the hand-off, shared by all workers.
#[derive(Clone)]
pub struct RecordQueue {
    rx: Arc<Mutex<mpsc::Receiver<ActivityRecord>>>,
}

impl RecordQueue {
    /// Waits for the next record; `None` once the sender is gone and the
    /// queue is empty. Cancel-safe.
    pub async fn next(&self) -> Option<ActivityRecord> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}
