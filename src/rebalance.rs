//! Background rebalancing of managed pools

use crate::config::RebalanceConfiguration;
use crate::controller::PoolController;
use crate::errors::PoolResult;
use crate::managed::{ManagablePool, ResizeHandle};
use crate::scheduler::PeriodicTask;

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registered pool together with the handle that may resize it
pub(crate) struct ManagedEntry {
    pool: Arc<dyn ManagablePool>,
    handle: ResizeHandle,
}

impl ManagedEntry {
    pub fn new(pool: Arc<dyn ManagablePool>, handle: ResizeHandle) -> Self {
        Self { pool, handle }
    }

    pub fn pool(&self) -> &Arc<dyn ManagablePool> {
        &self.pool
    }
}

pub(crate) type ManagedEntries = Arc<Mutex<Vec<Arc<ManagedEntry>>>>;

/// Outcome of one rebalancing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    /// Pools inspected
    pub inspected: usize,

    /// Pools that were grown
    pub grown: usize,

    /// Pools that were shrunk
    pub shrunk: usize,

    /// Pools whose resize failed (logged and skipped)
    pub failures: usize,
}

enum Action {
    Steady,
    Grew(usize),
    Shrank(usize),
}

/// Grows pools below the low-water mark and shrinks pools above the
/// high-water mark.
///
/// Cloning is cheap; clones see the same set of pools. Hosts that drive
/// their own timers can call [`Rebalancer::run`] directly.
#[derive(Clone)]
pub struct Rebalancer {
    entries: ManagedEntries,
    config: RebalanceConfiguration,
    controller: Arc<dyn PoolController>,
}

impl Rebalancer {
    pub(crate) fn new(entries: ManagedEntries, config: RebalanceConfiguration) -> Self {
        let controller = config.controller();
        Self {
            entries,
            config,
            controller,
        }
    }

    /// Replace the increment policy
    pub fn with_controller(mut self, controller: Arc<dyn PoolController>) -> Self {
        self.controller = controller;
        self
    }

    pub fn config(&self) -> &RebalanceConfiguration {
        &self.config
    }

    /// Inspect every registered pool once. A failing pool is logged and
    /// skipped; it never stops the pass.
    pub fn run(&self) -> RebalanceReport {
        // Resizing happens outside the registry lock
        let entries: Vec<Arc<ManagedEntry>> = self.entries.lock().clone();

        let mut report = RebalanceReport::default();
        for entry in entries {
            report.inspected += 1;
            match self.rebalance(&entry) {
                Ok(Action::Steady) => {}
                Ok(Action::Grew(count)) => {
                    report.grown += 1;
                    debug!(pool = %entry.pool.name(), count, "rebalance grew pool");
                }
                Ok(Action::Shrank(count)) => {
                    report.shrunk += 1;
                    debug!(pool = %entry.pool.name(), count, "rebalance shrank pool");
                }
                Err(err) => {
                    report.failures += 1;
                    warn!(pool = %entry.pool.name(), error = %err, "rebalance failed");
                }
            }
        }
        report
    }

    fn rebalance(&self, entry: &ManagedEntry) -> PoolResult<Action> {
        let size = entry.pool.size(&entry.handle)?;
        if size < self.config.low_water_mark {
            let amount = self.controller.grow(self.config.low_water_mark - size);
            let grown = entry.pool.grow(amount, &entry.handle)?;
            return Ok(Action::Grew(grown));
        }
        if size > self.config.high_water_mark {
            let amount = self.controller.shrink(size - self.config.high_water_mark);
            let shrunk = entry.pool.shrink(amount, &entry.handle)?;
            return Ok(Action::Shrank(shrunk));
        }
        Ok(Action::Steady)
    }

    /// Wrap this rebalancer as a task for a [`Scheduler`](crate::Scheduler)
    pub fn into_task(self) -> PeriodicTask {
        let repeat = self.config.repeat;
        let task = PeriodicTask::new(
            "rebalance",
            self.config.initial_delay,
            self.config.interval,
            move || {
                let report = self.run();
                debug!(?report, "rebalance tick");
            },
        );
        match repeat {
            Some(repeat) => task.with_repeat(repeat),
            None => task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfiguration;
    use crate::controller::FixedController;
    use crate::errors::PoolError;
    use crate::factory::FnFactory;
    use crate::pool::Pool;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tracing_test::traced_test;

    struct Counting {
        created: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
    }

    fn factory() -> (Arc<FnFactory<u32>>, Counting) {
        let created = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let counter = Arc::clone(&created);
        let fail = Arc::clone(&failing);
        let factory = FnFactory::new(move || {
            if fail.load(Ordering::SeqCst) {
                return Err("refused".into());
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(0u32)
        });
        (Arc::new(factory), Counting { created, failing })
    }

    fn register(entries: &ManagedEntries, min_size: usize) -> (Pool<FnFactory<u32>>, Counting) {
        let (factory, counting) = factory();
        let (pool, handle) =
            Pool::with_resize_handle(factory, PoolConfiguration::new().with_min_size(min_size)).unwrap();
        entries
            .lock()
            .push(Arc::new(ManagedEntry::new(Arc::new(pool.clone()), handle)));
        (pool, counting)
    }

    #[test]
    fn test_grows_pool_below_low_water_mark() {
        let entries = ManagedEntries::default();
        let (pool, counting) = register(&entries, 2);
        let rebalancer = Rebalancer::new(Arc::clone(&entries), RebalanceConfiguration::default());

        let report = rebalancer.run();
        assert_eq!(report.grown, 1);
        assert_eq!(pool.ready_count(), 6);
        assert_eq!(counting.created.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_shrinks_pool_above_high_water_mark() {
        let entries = ManagedEntries::default();
        let (pool, _) = register(&entries, 0);
        let rebalancer = Rebalancer::new(
            Arc::clone(&entries),
            RebalanceConfiguration::new().with_water_marks(0, 3).with_increment(2),
        );

        let held: Vec<_> = (0..6).map(|_| pool.acquire().unwrap()).collect();
        drop(held);
        assert_eq!(pool.ready_count(), 6);

        assert_eq!(rebalancer.run().shrunk, 1);
        assert_eq!(pool.ready_count(), 4);
        assert_eq!(rebalancer.run().shrunk, 1);
        assert_eq!(pool.ready_count(), 2);
        assert_eq!(rebalancer.run(), RebalanceReport { inspected: 1, ..Default::default() });
    }

    #[traced_test]
    #[test]
    fn test_failure_does_not_stop_pass() {
        let entries = ManagedEntries::default();
        let (_broken, broken_counting) = register(&entries, 0);
        let (healthy, _) = register(&entries, 0);
        broken_counting.failing.store(true, Ordering::SeqCst);

        let report = Rebalancer::new(Arc::clone(&entries), RebalanceConfiguration::default()).run();
        assert_eq!(report.inspected, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(report.grown, 1);
        assert_eq!(healthy.ready_count(), 4);
        assert!(logs_contain("rebalance failed"));
    }

    #[test]
    fn test_disposed_pool_counts_as_failure() {
        let entries = ManagedEntries::default();
        let (pool, _) = register(&entries, 0);
        pool.dispose();

        let report = Rebalancer::new(entries, RebalanceConfiguration::default()).run();
        assert_eq!(report.failures, 1);
        assert!(matches!(pool.acquire(), Err(PoolError::Disposed)));
    }

    #[test]
    fn test_custom_controller() {
        let entries = ManagedEntries::default();
        let (pool, _) = register(&entries, 0);
        let rebalancer = Rebalancer::new(Arc::clone(&entries), RebalanceConfiguration::default())
            .with_controller(Arc::new(FixedController::symmetric(10)));

        rebalancer.run();
        assert_eq!(pool.ready_count(), 10);
    }

    #[test]
    fn test_into_task_runs_pass() {
        let entries = ManagedEntries::default();
        let (pool, _) = register(&entries, 0);
        let mut task = Rebalancer::new(entries, RebalanceConfiguration::new().with_repeat(1)).into_task();

        assert_eq!(task.repeat(), Some(1));
        task.run();
        assert_eq!(pool.ready_count(), 4);
    }
}
