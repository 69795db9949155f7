use connectors::sql::base::session::SessionFactory;
use engine_processing::{
    consumer::{IngestWorker, config::WorkerConfig},
    error::{ConsumerError, PipelineError, ProducerError},
    producer::RecordFeeder,
    queue::RecordQueue,
};
use model::records::{activity::ActivityRecord, tally::Tally};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Where the first fatal failure of a run is published.
pub type FailureSender = mpsc::UnboundedSender<PipelineError>;

/// Records `err` as a run failure and tells everyone else to stop.
///
/// The failure is queued before the token fires, so whoever observes the
/// cancellation can already find its cause.
fn fail(failures: &FailureSender, cancel: &CancellationToken, err: PipelineError) {
    let _ = failures.send(err);
    cancel.cancel();
}

/// Runs the record feeder on a blocking thread. Resolves to the number of
/// records handed off, or `None` when the feed did not complete.
pub fn spawn_producer<I, E>(
    records: I,
    tx: mpsc::Sender<ActivityRecord>,
    failures: FailureSender,
    cancel: CancellationToken,
) -> JoinHandle<Option<u64>>
where
    I: Iterator<Item = Result<ActivityRecord, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let runtime = Handle::current();

    tokio::task::spawn_blocking(move || {
        // Keep the queue open until a failure has cancelled the run, or the
        // workers would commit their windows as if the input had ended.
        let open = tx.clone();
        let feeder = RecordFeeder::new(records, tx, cancel.clone(), runtime);

        let outcome = match feeder.run() {
            Ok(sent) => Some(sent),
            Err(ProducerError::Cancelled) => {
                debug!("Record feed stopped by cancellation");
                None
            }
            Err(err) => {
                error!(error = %err, "Record source failed");
                fail(&failures, &cancel, err.into());
                None
            }
        };
        drop(open);
        outcome
    })
}

/// Starts `count` workers, each on its own session from `factory`.
///
/// Workers that fail publish the failure and cancel the run. Workers that
/// are cancelled exit quietly. Tallies go to `tally_tx`.
pub fn spawn_workers<F>(
    factory: Arc<F>,
    config: WorkerConfig,
    count: usize,
    queue: RecordQueue,
    tally_tx: mpsc::Sender<Tally>,
    failures: FailureSender,
    cancel: CancellationToken,
) -> JoinSet<()>
where
    F: SessionFactory + 'static,
{
    let mut set = JoinSet::new();

    for id in 0..count {
        let factory = factory.clone();
        let queue = queue.clone();
        let tally_tx = tally_tx.clone();
        let failures = failures.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let result = match connect(id, factory.as_ref(), &cancel).await {
                Ok(session) => {
                    IngestWorker::new(id, session, config, queue, tally_tx, cancel.clone())
                        .run()
                        .await
                }
                Err(err) => Err(err),
            };

            if let Err(err) = result
                && !err.is_cancelled()
            {
                fail(&failures, &cancel, err.into());
            }
        });
    }

    set
}

async fn connect<F: SessionFactory>(
    id: usize,
    factory: &F,
    cancel: &CancellationToken,
) -> Result<F::Session, ConsumerError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ConsumerError::Cancelled { worker: id }),
        session = factory.open() => session.map_err(|source| {
            error!(worker = id, error = %source, "Worker failed to connect");
            ConsumerError::Connect { worker: id, source }
        }),
    }
}
