use crate::error::ProducerError;
use model::records::activity::ActivityRecord;
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Moves decoded records from a blocking source into the record queue.
///
/// The source is a plain iterator so file and stdin decoding stay off the
/// async workers; [`run`](RecordFeeder::run) must be called from a blocking
/// thread (`spawn_blocking`). Dropping the feeder closes the queue.
pub struct RecordFeeder<I> {
    records: I,
    tx: mpsc::Sender<ActivityRecord>,
    cancel: CancellationToken,
    runtime: Handle,
}

impl<I, E> RecordFeeder<I>
where
    I: Iterator<Item = Result<ActivityRecord, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(
        records: I,
        tx: mpsc::Sender<ActivityRecord>,
        cancel: CancellationToken,
        runtime: Handle,
    ) -> Self {
        Self {
            records,
            tx,
            cancel,
            runtime,
        }
    }

    /// Feeds every record, stopping at the first decode error or when the
    /// run is cancelled. Returns the number of records handed off.
    pub fn run(self) -> Result<u64, ProducerError> {
        let RecordFeeder {
            records,
            tx,
            cancel,
            runtime,
        } = self;
        let mut sent = 0u64;

        for item in records {
            let record = item.map_err(|e| ProducerError::Decode {
                record: sent + 1,
                source: Box::new(e),
            })?;
            runtime.block_on(hand_off(&tx, &cancel, record))?;
            sent += 1;
        }

        info!(records = sent, "Record source exhausted");
        Ok(sent)
    }
}

/// Pushes one record, giving up if the run is cancelled first.
async fn hand_off(
    tx: &mpsc::Sender<ActivityRecord>,
    cancel: &CancellationToken,
    record: ActivityRecord,
) -> Result<(), ProducerError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Cancellation observed while handing off a record");
            Err(ProducerError::Cancelled)
        }
        sent = tx.send(record) => sent.map_err(|_| ProducerError::ChannelClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{queue, testing::record};
    use std::fmt;

    #[derive(Debug)]
    struct BadRow;

    impl fmt::Display for BadRow {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bad row")
        }
    }

    impl std::error::Error for BadRow {}

    fn rows(guids: &[&str]) -> Vec<Result<ActivityRecord, BadRow>> {
        guids
            .iter()
            .map(|g| if *g == "!" { Err(BadRow) } else { Ok(record(g)) })
            .collect()
    }

    async fn feed(
        items: Vec<Result<ActivityRecord, BadRow>>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Result<u64, ProducerError>, Vec<String>) {
        let (tx, queue) = queue::channel(capacity);
        let feeder = RecordFeeder::new(items.into_iter(), tx, cancel, Handle::current());
        let handle = tokio::task::spawn_blocking(move || feeder.run());

        let mut received = Vec::new();
        while let Some(r) = queue.next().await {
            received.push(r.marketo_guid);
        }
        (handle.await.unwrap(), received)
    }

    #[tokio::test]
    async fn forwards_all_records_in_order() {
        let (result, received) = feed(rows(&["1", "2", "3"]), 1, CancellationToken::new()).await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(received, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn decode_error_stops_the_feed() {
        let (result, received) =
            feed(rows(&["1", "2", "!", "4"]), 4, CancellationToken::new()).await;

        match result {
            Err(ProducerError::Decode { record, .. }) => assert_eq!(record, 3),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(received, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn cancelled_push_is_abandoned() {
        let cancel = CancellationToken::new();
        let (tx, queue) = queue::channel(1);
        let feeder = RecordFeeder::new(
            rows(&["1", "2", "3"]).into_iter(),
            tx,
            cancel.clone(),
            Handle::current(),
        );
        let handle = tokio::task::spawn_blocking(move || feeder.run());

        // Nobody drains: the second push blocks on the full queue.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        assert!(matches!(handle.await.unwrap(), Err(ProducerError::Cancelled)));
        assert_eq!(queue.next().await.unwrap().marketo_guid, "1");
        assert!(queue.next().await.is_none());
    }
}
