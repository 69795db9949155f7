use crate::{
    commands::{Commands, LoadArgs},
    conn::PostgresConnectionPinger,
    error::CliError,
    shutdown::{EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    file::csv::{input::open_input, source::ActivityCsvSource},
    sql::postgres::{
        session::PgSessionFactory,
        utils::{connect_client, parse_config, ping},
    },
};
use engine_config::report::summary::{IngestSummary, process_memory};
use engine_runtime::{error::IngestError, execution::executor};
use std::{sync::Arc, time::Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "pload",
    version,
    about = "Concurrent bulk loader for CSV activity exports into Postgres"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout only carries the summary.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::new();
    shutdown.register_handlers();

    let result = match cli.command {
        Commands::Load(args) => run_load(args, &shutdown).await,
        Commands::TestConn { conn } => PostgresConnectionPinger { conn_str: &conn }.ping().await,
    };

    let code = match result {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            error!("{err}");
            if err.after_start() {
                error!(
                    "Transactions committed before the failure remain in the destination. \
                     Rerunning the same input is safe: existing rows are skipped."
                );
            }
            if shutdown.is_shutdown_requested() {
                EXIT_INTERRUPTED
            } else {
                EXIT_FAILURE
            }
        }
    };

    // Exit without waiting on a record source that may still be blocked on
    // standard input.
    std::process::exit(code);
}

async fn run_load(args: LoadArgs, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let settings = args.settings();
    settings.validate()?;

    let config = parse_config(&args.conn)?;
    let client = connect_client(&config).await?;
    ping(&client).await?;
    drop(client);

    let file = args.file.clone();
    let input = tokio::task::spawn_blocking(move || open_input(file.as_deref())).await??;
    match &args.file {
        Some(path) => info!("Reading activities from {}", path.display()),
        None => info!("Reading activities from standard input"),
    }

    let factory = Arc::new(PgSessionFactory::new(
        config,
        settings.table.clone(),
        settings.import_id,
    ));

    let start_time = Instant::now();
    let records = ActivityCsvSource::new(input);
    let totals = match executor::run(&settings, factory, records, shutdown.cancel_token()).await {
        Err(IngestError::Cancelled) if shutdown.is_shutdown_requested() => {
            return Err(CliError::ShutdownRequested);
        }
        other => other?,
    };

    let summary = IngestSummary::new(totals, start_time.elapsed(), process_memory());
    output::print_summary(&summary, args.json)
}
