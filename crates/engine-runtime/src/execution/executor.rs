use crate::{error::IngestError, execution::workers};
use connectors::sql::base::session::SessionFactory;
use engine_config::settings::IngestSettings;
use engine_processing::{consumer::config::WorkerConfig, queue};
use model::records::{activity::ActivityRecord, tally::Tally};
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Loads every record from `records` into the destination behind `factory`.
///
/// One blocking producer feeds a bounded queue that `settings.workers`
/// workers drain concurrently, each with its own session. On success the
/// summed tally of all workers is returned.
///
/// The first fatal error of either side cancels the run and is returned.
/// Transactions committed before that point stay committed. Cancelling
/// `cancel` stops the run the same way and yields [`IngestError::Cancelled`].
pub async fn run<F, I, E>(
    settings: &IngestSettings,
    factory: Arc<F>,
    records: I,
    cancel: &CancellationToken,
) -> Result<Tally, IngestError>
where
    F: SessionFactory + 'static,
    I: Iterator<Item = Result<ActivityRecord, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    settings.validate()?;

    let start_time = Instant::now();
    info!(
        table = %settings.table,
        workers = settings.workers,
        insert_size = settings.insert_size,
        tx_size = settings.tx_size,
        import_id = ?settings.import_id,
        "Starting load"
    );

    let cancel = cancel.child_token();
    let (record_tx, queue) = queue::channel(settings.workers);
    let (tally_tx, mut tally_rx) = mpsc::channel::<Tally>(1);
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();

    let mut worker_set = workers::spawn_workers(
        factory,
        WorkerConfig::from(settings),
        settings.workers,
        queue,
        tally_tx,
        failure_tx.clone(),
        cancel.clone(),
    );
    let producer = workers::spawn_producer(records, record_tx, failure_tx, cancel.clone());

    let mut totals = Tally::default();
    let mut reports = 0;
    while let Some(tally) = tally_rx.recv().await {
        totals += tally;
        reports += 1;
    }

    while let Some(joined) = worker_set.join_next().await {
        joined?;
    }

    if cancel.is_cancelled() {
        // The producer may be parked on a read that will never return.
        debug!("Detaching record source");
    } else if let Some(sent) = producer.await? {
        debug!(records = sent, "Record source finished");
    }

    if let Ok(err) = failure_rx.try_recv() {
        error!(error = %err, "Load failed");
        return Err(err.into());
    }

    if cancel.is_cancelled() || reports < settings.workers {
        warn!(
            reported = reports,
            workers = settings.workers,
            "Load cancelled before all workers reported"
        );
        return Err(IngestError::Cancelled);
    }

    info!(
        processed = totals.processed,
        affected = totals.affected,
        skipped = totals.skipped(),
        "Load completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(totals)
}
