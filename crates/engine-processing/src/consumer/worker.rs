use crate::{consumer::config::WorkerConfig, error::ConsumerError, queue::RecordQueue};
use connectors::sql::base::session::InsertSession;
use model::records::{activity::ActivityRecord, binding::BindingRow, tally::Tally};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One loader worker: pulls records off the queue, inserts them in
/// fixed-size batches and commits every `tx_size` records.
///
/// The worker owns its session for its whole life. Any store error ends the
/// worker after rolling back the open transaction; nothing is retried.
/// Cancellation is honoured between store calls (waiting for a record,
/// before a batch, before a commit, before reporting), never in the middle
/// of one, and also rolls back the open transaction.
pub struct IngestWorker<S> {
    id: usize,
    session: S,
    config: WorkerConfig,
    queue: RecordQueue,
    tally_tx: mpsc::Sender<Tally>,
    cancel: CancellationToken,

    batch: Vec<BindingRow>,
    window_records: usize,
    in_transaction: bool,
    tally: Tally,
}

impl<S: InsertSession> IngestWorker<S> {
    pub fn new(
        id: usize,
        session: S,
        config: WorkerConfig,
        queue: RecordQueue,
        tally_tx: mpsc::Sender<Tally>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            session,
            config,
            queue,
            tally_tx,
            cancel,
            batch: Vec::with_capacity(config.insert_size),
            window_records: 0,
            in_transaction: false,
            tally: Tally::default(),
        }
    }

    /// Loads until the queue is drained, then reports the tally.
    pub async fn run(mut self) -> Result<Tally, ConsumerError> {
        info!(worker = self.id, "Worker started");

        let result = match self.load().await {
            Ok(()) => self.report().await,
            Err(err) => {
                self.abort().await;
                Err(err)
            }
        };

        match &result {
            Ok(tally) => info!(
                worker = self.id,
                processed = tally.processed,
                affected = tally.affected,
                "Worker finished"
            ),
            Err(err) if err.is_cancelled() => warn!(worker = self.id, "Worker stopped early"),
            Err(err) => error!(worker = self.id, error = %err, "Worker failed"),
        }
        result
    }

    async fn load(&mut self) -> Result<(), ConsumerError> {
        self.open_window().await?;

        while let Some(record) = self.next_record().await? {
            self.batch.push(BindingRow::from(record));
            if self.batch.len() < self.config.insert_size {
                continue;
            }

            self.flush().await?;
            if self.window_records >= self.config.tx_size {
                self.commit_window().await?;
                self.open_window().await?;
            }
        }

        debug!(worker = self.id, pending = self.batch.len(), "Queue drained");
        if !self.batch.is_empty() {
            // The last batch is short: re-prepare for its exact row count.
            self.prepare(self.batch.len()).await?;
            self.flush().await?;
        }
        self.commit_window().await
    }

    async fn next_record(&mut self) -> Result<Option<ActivityRecord>, ConsumerError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled()),
            record = self.queue.next() => Ok(record),
        }
    }

    async fn open_window(&mut self) -> Result<(), ConsumerError> {
        self.session
            .begin()
            .await
            .map_err(|source| ConsumerError::Begin {
                worker: self.id,
                source,
            })?;
        self.in_transaction = true;
        self.window_records = 0;
        self.prepare(self.config.insert_size).await
    }

    async fn prepare(&mut self, rows: usize) -> Result<(), ConsumerError> {
        self.session
            .prepare(rows)
            .await
            .map_err(|source| ConsumerError::Prepare {
                worker: self.id,
                rows,
                source,
            })
    }

    async fn flush(&mut self) -> Result<(), ConsumerError> {
        self.ensure_active()?;

        let rows = self.batch.len();
        let affected = self
            .session
            .insert(&self.batch)
            .await
            .map_err(|source| ConsumerError::Insert {
                worker: self.id,
                rows,
                source,
            })?;

        self.tally.record_batch(rows, affected);
        self.window_records += rows;
        self.batch.clear();
        debug!(worker = self.id, rows, affected, "Batch inserted");
        Ok(())
    }

    async fn commit_window(&mut self) -> Result<(), ConsumerError> {
        self.ensure_active()?;

        self.session
            .commit()
            .await
            .map_err(|source| ConsumerError::Commit {
                worker: self.id,
                source,
            })?;
        self.in_transaction = false;
        info!(
            worker = self.id,
            records = self.window_records,
            "Transaction committed"
        );
        Ok(())
    }

    /// Rolls back the open transaction, if any. Failures are only logged:
    /// the worker is already on its way out with a more relevant error.
    async fn abort(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;

        let discarded = self.window_records + self.batch.len();
        match self.session.rollback().await {
            Ok(()) => warn!(
                worker = self.id,
                records = discarded,
                "Transaction rolled back"
            ),
            Err(err) => warn!(worker = self.id, error = %err, "Rollback failed"),
        }
    }

    async fn report(&mut self) -> Result<Tally, ConsumerError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled()),
            sent = self.tally_tx.send(self.tally) => {
                sent.map_err(|_| self.cancelled())?;
                Ok(self.tally)
            }
        }
    }

    fn ensure_active(&self) -> Result<(), ConsumerError> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        Ok(())
    }

    fn cancelled(&self) -> ConsumerError {
        ConsumerError::Cancelled { worker: self.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        queue,
        testing::{MemoryStore, SessionEvent, batch_sizes, inserts_per_commit, record},
    };
    use tracing_test::traced_test;

    struct Harness {
        store: MemoryStore,
        tally_rx: mpsc::Receiver<Tally>,
        handle: tokio::task::JoinHandle<Result<Tally, ConsumerError>>,
    }

    /// Runs one worker over `guids`, closing the queue after the last one.
    fn start(store: MemoryStore, guids: Vec<String>, insert_size: usize, tx_size: usize) -> Harness {
        let (tx, queue) = queue::channel(1);
        let (tally_tx, tally_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let worker = IngestWorker::new(
            0,
            store.session(),
            WorkerConfig::new(insert_size, tx_size),
            queue,
            tally_tx,
            cancel,
        );
        let handle = tokio::spawn(worker.run());

        tokio::spawn(async move {
            for guid in guids {
                if tx.send(record(&guid)).await.is_err() {
                    break;
                }
            }
        });

        Harness {
            store,
            tally_rx,
            handle,
        }
    }

    fn guids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
        range.map(|g| g.to_string()).collect()
    }

    #[tokio::test]
    async fn short_final_batch_gets_its_own_statement() {
        let mut h = start(MemoryStore::new(), guids(1..=5), 2, 100);

        let tally = h.handle.await.unwrap().unwrap();
        assert_eq!(tally, Tally::new(5, 5));
        assert_eq!(h.tally_rx.recv().await, Some(Tally::new(5, 5)));

        let log = &h.store.logs()[0];
        assert_eq!(batch_sizes(log), vec![2, 2, 1]);
        assert_eq!(
            log,
            &vec![
                SessionEvent::Begin,
                SessionEvent::Prepare(2),
                SessionEvent::Insert(2),
                SessionEvent::Insert(2),
                SessionEvent::Prepare(1),
                SessionEvent::Insert(1),
                SessionEvent::Commit,
            ]
        );
        assert_eq!(h.store.committed_guids(), guids(1..=5));
    }

    #[tokio::test]
    async fn commits_every_tx_size_records() {
        let mut h = start(MemoryStore::new(), guids(1..=7), 1, 3);

        h.handle.await.unwrap().unwrap();
        assert_eq!(h.tally_rx.recv().await, Some(Tally::new(7, 7)));

        let log = &h.store.logs()[0];
        assert_eq!(inserts_per_commit(log), vec![3, 3, 1]);
        assert_eq!(
            log.iter().filter(|e| **e == SessionEvent::Begin).count(),
            3
        );
    }

    #[tokio::test]
    async fn transaction_boundary_never_splits_a_batch() {
        let h = start(MemoryStore::new(), guids(1..=10), 2, 3);

        h.handle.await.unwrap().unwrap();
        // 2+2 reaches 3, so each window holds two full batches.
        assert_eq!(inserts_per_commit(&h.store.logs()[0]), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn empty_stream_commits_an_empty_window() {
        let mut h = start(MemoryStore::new(), Vec::new(), 2, 3);

        assert_eq!(h.handle.await.unwrap().unwrap(), Tally::default());
        assert_eq!(h.tally_rx.recv().await, Some(Tally::default()));
        assert_eq!(
            h.store.logs()[0],
            vec![
                SessionEvent::Begin,
                SessionEvent::Prepare(2),
                SessionEvent::Commit
            ]
        );
    }

    #[tokio::test]
    async fn null_text_is_stored_as_null() {
        let store = MemoryStore::new();
        let (tx, queue) = queue::channel(1);
        let (tally_tx, _tally_rx) = mpsc::channel(1);
        let mut sparse = record("9");
        sparse.lead_id = "null".to_string();
        sparse.attributes = "null".to_string();
        tx.send(sparse).await.unwrap();
        drop(tx);

        IngestWorker::new(
            0,
            store.session(),
            WorkerConfig::new(1, 10),
            queue,
            tally_tx,
            CancellationToken::new(),
        )
        .run()
        .await
        .unwrap();

        let rows = store.committed();
        assert_eq!(rows[0].lead_id, None);
        assert_eq!(rows[0].campaign_id, None);
        assert_eq!(rows[0].attributes, None);
        assert_eq!(rows[0].primary_attribute_value.as_deref(), Some("Signup Form"));
    }

    #[tokio::test]
    async fn existing_keys_count_as_processed_not_affected() {
        let store = MemoryStore::new();
        let first = start(store.clone(), guids(1..=4), 2, 10);
        first.handle.await.unwrap().unwrap();

        let second = start(store.clone(), guids(3..=6), 2, 10);
        assert_eq!(second.handle.await.unwrap().unwrap(), Tally::new(4, 2));
        assert_eq!(store.committed_guids(), guids(1..=6));
    }

    #[traced_test]
    #[tokio::test]
    async fn insert_failure_rolls_back_open_window() {
        let store = MemoryStore::failing_on("4");
        let (tx, queue) = queue::channel(8);
        let (tally_tx, mut tally_rx) = mpsc::channel(1);
        for guid in guids(1..=5) {
            tx.send(record(&guid)).await.unwrap();
        }
        drop(tx);

        let worker = IngestWorker::new(
            0,
            store.session(),
            WorkerConfig::new(1, 3),
            queue,
            tally_tx,
            CancellationToken::new(),
        );
        let err = worker.run().await.unwrap_err();

        assert!(matches!(err, ConsumerError::Insert { rows: 1, .. }));
        assert!(tally_rx.recv().await.is_none());
        assert_eq!(store.committed_guids(), guids(1..=3));
        assert_eq!(store.logs()[0].last(), Some(&SessionEvent::Rollback));
        assert!(logs_contain("Transaction rolled back"));
    }

    #[tokio::test]
    async fn remainder_prepare_failure_rolls_back() {
        let mut h = start(MemoryStore::failing_prepare(1), guids(1..=5), 2, 2);

        let err = h.handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ConsumerError::Prepare { rows: 1, .. }));
        assert!(h.tally_rx.recv().await.is_none());

        // Two full windows were committed before the short batch.
        assert_eq!(h.store.committed_guids(), guids(1..=4));
        let log = &h.store.logs()[0];
        assert_eq!(
            &log[log.len() - 2..],
            &[SessionEvent::Prepare(1), SessionEvent::Rollback]
        );
    }

    #[tokio::test]
    async fn window_prepare_failure_stops_before_any_insert() {
        let h = start(MemoryStore::failing_prepare(3), guids(1..=5), 3, 10);

        let err = h.handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ConsumerError::Prepare { rows: 3, .. }));
        assert!(h.store.committed().is_empty());
        assert_eq!(
            h.store.logs()[0],
            vec![
                SessionEvent::Begin,
                SessionEvent::Prepare(3),
                SessionEvent::Rollback
            ]
        );
    }

    #[tokio::test]
    async fn commit_failure_rolls_back() {
        let mut h = start(MemoryStore::failing_commit(2), guids(1..=5), 1, 2);

        let err = h.handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ConsumerError::Commit { worker: 0, .. }));
        assert!(h.tally_rx.recv().await.is_none());

        assert_eq!(h.store.committed_guids(), guids(1..=2));
        let log = &h.store.logs()[0];
        assert_eq!(
            &log[log.len() - 2..],
            &[SessionEvent::Commit, SessionEvent::Rollback]
        );
    }

    #[tokio::test]
    async fn cancellation_while_waiting_rolls_back() {
        let store = MemoryStore::new();
        let (tx, queue) = queue::channel(1);
        let (tally_tx, mut tally_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let worker = IngestWorker::new(
            3,
            store.session(),
            WorkerConfig::new(1, 10),
            queue,
            tally_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(worker.run());

        tx.send(record("1")).await.unwrap();
        tx.send(record("2")).await.unwrap();
        // Keep the sender alive: the worker is parked waiting for more.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ConsumerError::Cancelled { worker: 3 }));
        assert!(tally_rx.recv().await.is_none());
        assert!(store.committed().is_empty());
        assert_eq!(store.logs()[0].last(), Some(&SessionEvent::Rollback));
        drop(tx);
    }

    #[tokio::test]
    async fn cancelled_report_is_not_delivered() {
        let store = MemoryStore::new();
        let (tx, queue) = queue::channel(1);
        // Fill the tally channel so the report has to wait.
        let (tally_tx, mut tally_rx) = mpsc::channel(1);
        tally_tx.send(Tally::new(99, 99)).await.unwrap();
        let cancel = CancellationToken::new();

        let worker = IngestWorker::new(
            0,
            store.session(),
            WorkerConfig::new(2, 10),
            queue,
            tally_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(worker.run());

        tx.send(record("1")).await.unwrap();
        drop(tx);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        assert!(handle.await.unwrap().unwrap_err().is_cancelled());
        // The data was committed before the report was attempted.
        assert_eq!(store.committed_guids(), vec!["1".to_string()]);
        assert_eq!(tally_rx.recv().await, Some(Tally::new(99, 99)));
        assert!(tally_rx.recv().await.is_none());
    }
}
