use std::collections::BTreeSet;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{info, warn};

use storesync_core::Counter;
use storesync_infra::dispatch::{BatchDispatcher, DispatchMode};
use storesync_infra::registry::StoreSelection;

use crate::wiring::App;

#[derive(clap::Args)]
pub struct Args {
    /// `any`, or a comma-separated list of store ids
    #[arg(long, default_value = "any")]
    store_ids: String,

    /// Only stores updated at or after this time (UTC)
    #[arg(long)]
    updated_at_min: Option<String>,

    /// Refresh the customer count
    #[arg(long)]
    customer_count: bool,

    /// Refresh the order count
    #[arg(long)]
    order_count: bool,

    /// Refresh the product count
    #[arg(long)]
    product_count: bool,

    /// `sync` runs inline; any other name queues on that connection
    #[arg(long, default_value = "sync")]
    connection: String,
}

impl Args {
    fn counters(&self) -> BTreeSet<Counter> {
        [
            (self.customer_count, Counter::CustomerCount),
            (self.order_count, Counter::OrderCount),
            (self.product_count, Counter::ProductCount),
        ]
        .into_iter()
        .filter_map(|(requested, counter)| requested.then_some(counter))
        .collect()
    }
}

pub fn run(args: Args) -> Result<ExitCode> {
    let selection = StoreSelection::parse(Some(&args.store_ids), args.updated_at_min.as_deref())
        .context("invalid store selection")?;
    let counters = args.counters();
    let mode: DispatchMode = args.connection.parse()?;

    let app = App::from_env()?;
    let mut dispatcher = BatchDispatcher::new(
        app.registry.clone(),
        app.runner.clone(),
        app.factory.clone(),
        app.config.chunk_size,
    );
    if let Some(queue) = app.queue.clone() {
        dispatcher = dispatcher.with_queue(queue);
    }

    let report = dispatcher.run(&selection, &counters, &mode, &mut |notice| {
        println!("{notice}");
    })?;

    info!(
        visited = report.visited,
        completed = report.completed,
        skipped = report.skipped,
        queued = report.queued,
        failed = report.failed.len(),
        "update-stores finished"
    );

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(failed = ?report.failed, "some stores failed to update");
        Ok(ExitCode::FAILURE)
    }
}
