use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use tracing::info;

use storesync_infra::workers::{QueueWorker, WorkOutcome, WorkerConfig};

use crate::wiring::App;

#[derive(clap::Args)]
pub struct Args {
    /// Queue connection to consume
    #[arg(long, default_value = "default")]
    connection: String,

    /// Drain the connection and exit instead of polling forever
    #[arg(long)]
    once: bool,
}

pub fn run(args: Args) -> Result<ExitCode> {
    let app = App::from_env()?;
    let Some(queue) = app.queue.clone() else {
        bail!("REDIS_URL is not set; there is no queue to work");
    };
    let worker = QueueWorker::new(queue, app.registry.clone(), app.factory.clone(), app.runner.clone());

    if args.once {
        let outcomes = worker.drain(&args.connection)?;
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, WorkOutcome::Failed { .. }))
            .count();
        info!(processed = outcomes.len(), failed, connection = %args.connection, "queue drained");
        return Ok(if failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let config = WorkerConfig::default()
        .with_connection(args.connection)
        .with_poll_interval(app.config.worker_poll_interval);
    let handle = worker.spawn(config).context("failed to spawn queue worker")?;

    app.runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    let stats = handle.stats();
    handle.shutdown();
    info!(
        processed = stats.processed,
        succeeded = stats.succeeded,
        failed = stats.failed,
        skipped = stats.skipped,
        discarded = stats.discarded,
        "queue worker exited"
    );
    Ok(ExitCode::SUCCESS)
}
