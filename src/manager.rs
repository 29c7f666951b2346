//! Pool registry keyed by factory identity

use crate::config::{PoolConfiguration, RebalanceConfiguration};
use crate::errors::{PoolError, PoolResult};
use crate::factory::ObjectFactory;
use crate::managed::ManagablePool;
use crate::pool::Pool;
use crate::rebalance::{ManagedEntries, ManagedEntry, RebalanceReport, Rebalancer};
use crate::scheduler::Scheduler;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Identity of a factory: its concrete type and the address of its `Arc`.
/// The registered pool keeps the `Arc` alive, so the address is never
/// reused while the entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FactoryKey {
    type_id: TypeId,
    address: usize,
}

impl FactoryKey {
    fn of<F: ObjectFactory>(factory: &Arc<F>) -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            address: Arc::as_ptr(factory) as *const () as usize,
        }
    }
}

/// Creates, caches and rebalances managed pools.
///
/// A manager is an ordinary value: construct one per application context and
/// pass it where it is needed. Pools are cached by factory identity, so
/// asking twice with the same `Arc` returns the same pool. Each pool's
/// [`ResizeHandle`](crate::ResizeHandle) stays inside the manager, which
/// makes the rebalancing task the only thing able to resize it.
///
/// # Examples
///
/// ```
/// use poolkit::{FnFactory, PoolManager, RebalanceConfiguration};
/// use std::sync::Arc;
///
/// let manager = PoolManager::new(RebalanceConfiguration::default()).unwrap();
/// let factory = Arc::new(FnFactory::infallible(|| Vec::<u8>::with_capacity(1024)));
///
/// let pool = manager.get_managed_pool(Arc::clone(&factory), 2).unwrap();
/// let same = manager.get_managed_pool(factory, 8).unwrap();
/// assert_eq!(same.ready_count(), 2);
///
/// manager.rebalance_now();
/// assert_eq!(pool.ready_count(), 6);
/// ```
pub struct PoolManager {
    pools: DashMap<FactoryKey, Box<dyn Any + Send + Sync>>,
    entries: ManagedEntries,
    rebalancer: Rebalancer,
    scheduler: Option<Arc<dyn Scheduler>>,
    scheduled: AtomicBool,
    disposed: AtomicBool,
}

impl PoolManager {
    /// Create a manager whose rebalancing is driven by the host through
    /// [`rebalance_now`](Self::rebalance_now) or [`rebalancer`](Self::rebalancer)
    pub fn new(config: RebalanceConfiguration) -> PoolResult<Self> {
        config.validate()?;
        let entries = ManagedEntries::default();
        Ok(Self {
            pools: DashMap::new(),
            rebalancer: Rebalancer::new(Arc::clone(&entries), config),
            entries,
            scheduler: None,
            scheduled: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Create a manager that submits its rebalancing task to `scheduler`
    /// when the first pool is registered
    pub fn with_scheduler(config: RebalanceConfiguration, scheduler: Arc<dyn Scheduler>) -> PoolResult<Self> {
        let mut manager = Self::new(config)?;
        manager.scheduler = Some(scheduler);
        Ok(manager)
    }

    /// Get the pool for `factory`, creating it with `initial_entries` ready
    /// instances on first request. The initial size is also the floor.
    pub fn get_managed_pool<F: ObjectFactory>(&self, factory: Arc<F>, initial_entries: usize) -> PoolResult<Pool<F>> {
        let config = PoolConfiguration::new().with_min_size(initial_entries);
        let config = config.with_max_size(initial_entries.max(PoolConfiguration::default().max_size));
        self.get_managed_pool_with(factory, config)
    }

    /// Get the pool for `factory`, creating it from `config` on first
    /// request. A pool that already exists is returned unchanged.
    pub fn get_managed_pool_with<F: ObjectFactory>(
        &self,
        factory: Arc<F>,
        config: PoolConfiguration,
    ) -> PoolResult<Pool<F>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(PoolError::Disposed);
        }
        let key = FactoryKey::of(&factory);
        if let Some(existing) = self.pools.get(&key) {
            return Self::downcast(&**existing.value());
        }

        // Prefill runs factory code, so build before taking the shard lock
        let (fresh, handle) = Pool::with_resize_handle(factory, config)?;
        let registered = match self.pools.entry(key) {
            Entry::Occupied(entry) => Err(Self::downcast::<F>(&**entry.get())),
            Entry::Vacant(entry) => {
                let mut entries = self.entries.lock();
                if self.disposed.load(Ordering::Acquire) {
                    Err(Err(PoolError::Disposed))
                } else {
                    let managed: Arc<dyn ManagablePool> = Arc::new(fresh.clone());
                    entries.push(Arc::new(ManagedEntry::new(managed, handle)));
                    entry.insert(Box::new(fresh.clone()));
                    Ok(())
                }
            }
        };
        if let Err(outcome) = registered {
            // Lost a registration race or the manager shut down meanwhile
            fresh.dispose();
            return outcome;
        }
        debug!(pool = %fresh.name(), policy = %fresh.policy(), "registered managed pool");

        self.schedule_rebalancing();
        Ok(fresh)
    }

    fn downcast<F: ObjectFactory>(registered: &(dyn Any + Send + Sync)) -> PoolResult<Pool<F>> {
        registered.downcast_ref::<Pool<F>>().cloned().ok_or_else(|| {
            PoolError::InvalidConfiguration("factory registered with another pool type".to_string())
        })
    }

    fn schedule_rebalancing(&self) {
        let Some(ref scheduler) = self.scheduler else {
            return;
        };
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(err) = scheduler.schedule(self.rebalancer.clone().into_task()) {
            // Retry on the next registration
            self.scheduled.store(false, Ordering::Release);
            warn!(error = %err, "failed to schedule rebalancing");
        }
    }

    /// Run one rebalancing pass on the calling thread
    pub fn rebalance_now(&self) -> RebalanceReport {
        self.rebalancer.run()
    }

    /// The rebalancing task, for hosts that schedule it themselves
    pub fn rebalancer(&self) -> Rebalancer {
        self.rebalancer.clone()
    }

    /// Number of registered pools
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Dispose and forget every registered pool. Later registrations fail
    /// with [`PoolError::Disposed`].
    pub fn dispose(&self) {
        let entries = {
            let mut entries = self.entries.lock();
            self.disposed.store(true, Ordering::Release);
            std::mem::take(&mut *entries)
        };
        self.pools.clear();
        for entry in &entries {
            entry.pool().dispose();
        }
        debug!(pools = entries.len(), "disposed pool manager");
    }
}

impl fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("pools", &self.pools.len())
            .field("scheduled", &self.scheduled.load(Ordering::Acquire))
            .field("disposed", &self.disposed.load(Ordering::Acquire))
            .finish()
    }
}
