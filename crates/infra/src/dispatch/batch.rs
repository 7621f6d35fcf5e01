//! Chunked batch dispatch over the store registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info};

use storesync_core::{Counter, Store, StoreId};

use crate::jobs::{JobFactory, JobKind, JobOutcome, JobRequest, JobRunner};
use crate::queue::JobQueue;
use crate::registry::{StoreRegistry, StoreSelection};

use super::DispatchError;
use super::strategy::{DispatchMode, DispatchStrategy, Dispatched, InlineStrategy, QueuedStrategy};

/// `Update for Store(<id>): <domain>, has completed.`
pub fn completion_notice(store: &Store) -> String {
    format!(
        "Update for Store({}): {}, has completed.",
        store.id, store.myshopify_domain
    )
}

/// Tally of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Size of each chunk read from the registry, in order.
    pub chunks: Vec<usize>,
    pub visited: usize,
    pub completed: usize,
    pub skipped: usize,
    pub queued: usize,
    pub failed: Vec<StoreId>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Walks the selected stores chunk by chunk and dispatches one job per store.
pub struct BatchDispatcher {
    registry: Arc<dyn StoreRegistry>,
    runner: JobRunner,
    factory: Arc<dyn JobFactory>,
    queue: Option<Arc<dyn JobQueue>>,
    chunk_size: usize,
}

impl BatchDispatcher {
    pub fn new(
        registry: Arc<dyn StoreRegistry>,
        runner: JobRunner,
        factory: Arc<dyn JobFactory>,
        chunk_size: usize,
    ) -> Self {
        Self {
            registry,
            runner,
            factory,
            queue: None,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn strategy(&self, mode: &DispatchMode) -> Result<Box<dyn DispatchStrategy>, DispatchError> {
        match mode {
            DispatchMode::Inline => Ok(Box::new(InlineStrategy::new(
                self.runner.clone(),
                Arc::clone(&self.factory),
            ))),
            DispatchMode::Queued { connection } => {
                let queue = self
                    .queue
                    .clone()
                    .ok_or_else(|| DispatchError::NoQueue(connection.clone()))?;
                Ok(Box::new(QueuedStrategy::new(queue, connection.clone())))
            }
        }
    }

    /// Dispatch one `UpdateStore` job per selected store.
    ///
    /// `notices` receives a completion line for every store that finished,
    /// was skipped on contention, or was accepted by the queue. A failing
    /// inline job is logged as `failed`, recorded in the report, and the run
    /// moves on to the next store. Registry and queue errors abort the run.
    pub fn run(
        &self,
        selection: &StoreSelection,
        counters: &BTreeSet<Counter>,
        mode: &DispatchMode,
        notices: &mut dyn FnMut(&str),
    ) -> Result<BatchReport, DispatchError> {
        let strategy = self.strategy(mode)?;
        let mut report = BatchReport::default();
        let mut after: Option<StoreId> = None;

        info!(mode = %mode, chunk_size = self.chunk_size, "batch dispatch started");

        loop {
            let chunk = self
                .registry
                .next_chunk(selection, after, self.chunk_size)?;
            let Some(last) = chunk.last() else {
                break;
            };
            after = Some(last.id);
            report.chunks.push(chunk.len());
            let short = chunk.len() < self.chunk_size;

            for store in chunk {
                report.visited += 1;
                let request = JobRequest::update_store(store.clone(), counters.clone());

                match strategy.dispatch(request) {
                    Ok(Dispatched::Completed(JobOutcome::Finished { .. })) => report.completed += 1,
                    Ok(Dispatched::Completed(JobOutcome::Skipped)) => report.skipped += 1,
                    Ok(Dispatched::Queued(_)) => report.queued += 1,
                    Err(DispatchError::Job(err)) => {
                        error!(store_id = %store.id, error = %err, "store job failed");
                        self.runner
                            .logger()
                            .failed(JobKind::UpdateStore, &store, None, &err);
                        report.failed.push(store.id);
                        continue;
                    }
                    Err(err) => return Err(err),
                }

                notices(&completion_notice(&store));
            }

            if short {
                break;
            }
        }

        info!(
            visited = report.visited,
            completed = report.completed,
            skipped = report.skipped,
            queued = report.queued,
            failed = report.failed.len(),
            "batch dispatch finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::audit::{EventLogger, MemorySink, Severity};
    use crate::cache::InMemoryLockCache;
    use crate::jobs::{ExecutionBudget, JobContext, JobError, JobSummary, LockManager, StoreJob};
    use crate::queue::InMemoryJobQueue;
    use crate::registry::{InMemoryStoreRegistry, StoreIds};
    use crate::shopify::StoreApiError;

    /// Records every store it runs; fails for the ids in `failing`.
    #[derive(Default)]
    struct RecordingFactory {
        ran: Arc<Mutex<Vec<StoreId>>>,
        failing: BTreeSet<StoreId>,
    }

    struct RecordingJob {
        store: Store,
        ran: Arc<Mutex<Vec<StoreId>>>,
        fail: bool,
    }

    impl StoreJob for RecordingJob {
        fn kind(&self) -> JobKind {
            JobKind::UpdateStore
        }

        fn store(&self) -> &Store {
            &self.store
        }

        fn handle(&mut self, _ctx: &JobContext) -> Result<JobSummary, JobError> {
            self.ran.lock().unwrap().push(self.store.id);
            if self.fail {
                return Err(JobError::Fetch(StoreApiError::Http("connection reset".into())));
            }
            Ok(JobSummary::new())
        }
    }

    impl JobFactory for RecordingFactory {
        fn build(&self, request: JobRequest) -> Box<dyn StoreJob> {
            Box::new(RecordingJob {
                fail: self.failing.contains(&request.store.id),
                store: request.store,
                ran: Arc::clone(&self.ran),
            })
        }
    }

    struct Fixture {
        dispatcher: BatchDispatcher,
        ran: Arc<Mutex<Vec<StoreId>>>,
        sink: Arc<MemorySink>,
        queue: Arc<InMemoryJobQueue>,
        runner: JobRunner,
    }

    fn fixture(stores: Vec<Store>, chunk_size: usize, failing: &[i64]) -> Fixture {
        let sink = Arc::new(MemorySink::new());
        let logger = EventLogger::new(sink.clone(), "storesync");
        let locks = LockManager::new(
            Arc::new(InMemoryLockCache::new()),
            logger.clone(),
            Duration::from_secs(60),
        );
        let runner = JobRunner::new(locks, logger, ExecutionBudget::unlimited());
        let factory = RecordingFactory {
            failing: failing.iter().copied().map(StoreId::new).collect(),
            ..RecordingFactory::default()
        };
        let ran = Arc::clone(&factory.ran);
        let queue = Arc::new(InMemoryJobQueue::new());
        let dispatcher = BatchDispatcher::new(
            Arc::new(InMemoryStoreRegistry::with_stores(stores)),
            runner.clone(),
            Arc::new(factory),
            chunk_size,
        )
        .with_queue(queue.clone());

        Fixture {
            dispatcher,
            ran,
            sink,
            queue,
            runner,
        }
    }

    fn stores(n: i64) -> Vec<Store> {
        (1..=n)
            .map(|id| Store::new(StoreId::new(id), format!("shop{id}.myshopify.com"), "tok"))
            .collect()
    }

    fn run(f: &Fixture, selection: &StoreSelection, mode: &DispatchMode) -> (BatchReport, Vec<String>) {
        let mut notices = Vec::new();
        let report = f
            .dispatcher
            .run(selection, &BTreeSet::new(), mode, &mut |n| notices.push(n.to_string()))
            .unwrap();
        (report, notices)
    }

    #[test]
    fn inline_run_notifies_per_store_in_id_order() {
        let f = fixture(stores(3), 2, &[]);

        let (report, notices) = run(&f, &StoreSelection::all(), &DispatchMode::Inline);

        assert_eq!(report.chunks, vec![2, 1]);
        assert_eq!(report.completed, 3);
        assert!(report.is_success());
        assert_eq!(
            notices,
            vec![
                "Update for Store(1): shop1.myshopify.com, has completed.",
                "Update for Store(2): shop2.myshopify.com, has completed.",
                "Update for Store(3): shop3.myshopify.com, has completed.",
            ]
        );
    }

    #[test]
    fn failing_store_is_logged_and_the_batch_continues() {
        let f = fixture(stores(4), 10, &[2]);

        let (report, notices) = run(&f, &StoreSelection::all(), &DispatchMode::Inline);

        assert_eq!(report.completed, 3);
        assert_eq!(report.failed, vec![StoreId::new(2)]);
        assert!(!report.is_success());
        assert_eq!(notices.len(), 3);
        assert_eq!(f.ran.lock().unwrap().len(), 4);

        let failed = f.sink.named("failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].severity(), Severity::Error);
        assert_eq!(failed[0].message(), "update_store:shop2.myshopify.com:failed");
        assert!(failed[0].data()["error"].as_str().unwrap().contains("connection reset"));
    }

    #[test]
    fn locked_store_is_skipped_without_running() {
        let all = stores(2);
        let f = fixture(all.clone(), 10, &[]);
        f.runner
            .locks()
            .acquire(JobKind::UpdateStore, &all[0], None)
            .unwrap();

        let (report, notices) = run(&f, &StoreSelection::all(), &DispatchMode::Inline);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(notices.len(), 2);
        assert_eq!(*f.ran.lock().unwrap(), vec![StoreId::new(2)]);
        assert_eq!(f.sink.named("started").len(), 1);
    }

    #[test]
    fn queued_mode_enqueues_one_payload_per_store() {
        let f = fixture(stores(5), 2, &[]);

        let (report, notices) = run(&f, &StoreSelection::all(), &DispatchMode::queued("bulk"));

        assert_eq!(report.queued, 5);
        assert_eq!(notices.len(), 5);
        assert_eq!(f.queue.len("bulk"), 5);
        assert!(f.ran.lock().unwrap().is_empty());
        assert!(f.sink.named("started").is_empty());
    }

    #[test]
    fn queued_mode_without_a_queue_fails_before_reading_stores() {
        let f = fixture(stores(1), 10, &[]);
        let dispatcher = BatchDispatcher::new(
            Arc::new(InMemoryStoreRegistry::with_stores(stores(1))),
            f.runner.clone(),
            Arc::new(RecordingFactory::default()),
            10,
        );

        let err = dispatcher
            .run(
                &StoreSelection::all(),
                &BTreeSet::new(),
                &DispatchMode::queued("bulk"),
                &mut |_| {},
            )
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoQueue(name) if name == "bulk"));
    }

    #[test]
    fn selection_limits_the_visited_stores() {
        let mut all = stores(10);
        all[4].installed = false;
        let f = fixture(all, 3, &[]);
        let selection = StoreSelection::all().with_store_ids(StoreIds::only([5i64, 9]));

        let (report, _) = run(&f, &selection, &DispatchMode::Inline);

        assert_eq!(report.visited, 1);
        assert_eq!(*f.ran.lock().unwrap(), vec![StoreId::new(9)]);
    }

    proptest! {
        #[test]
        fn every_selected_store_is_visited_exactly_once(n in 0i64..60, chunk in 1usize..20) {
            let f = fixture(stores(n), chunk, &[]);

            let (report, notices) = run(&f, &StoreSelection::all(), &DispatchMode::Inline);

            let n = n as usize;
            prop_assert_eq!(report.chunks.len(), n.div_ceil(chunk));
            prop_assert_eq!(report.chunks.iter().sum::<usize>(), n);
            prop_assert!(report.chunks.iter().all(|&c| c <= chunk));
            prop_assert_eq!(notices.len(), n);

            let ran = f.ran.lock().unwrap().clone();
            let expected: Vec<StoreId> = (1..=n as i64).map(StoreId::new).collect();
            prop_assert_eq!(ran, expected);
        }
    }
}
