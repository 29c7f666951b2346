//! Synchronized pool engine
//!
//! One `Pool` type covers the unbounded, soft-limit, hard-limit and timeout
//! disciplines; [`LimitingPolicy`] decides what `acquire` does when the ready
//! set is empty. All state lives in a `PoolCore` behind one mutex, and
//! blocking acquirers park on a condition variable signalled by releases.
//! Factory calls never run while the lock is held.

use crate::config::{LimitingPolicy, PoolConfiguration};
use crate::controller::PoolController;
use crate::state::PoolCore;
use crate::errors::{PoolError, PoolResult};
use crate::factory::{ObjectFactory, Poolable};
use crate::health::HealthStatus;
use crate::managed::{ManagablePool, ResizeHandle};
use crate::metrics::{MetricsTracker, PoolMetrics};

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// An active instance; returns to its pool when dropped
pub struct PooledObject<F: ObjectFactory> {
    value: Option<F::Object>,
    pool: Arc<Shared<F>>,
}

impl<F: ObjectFactory> PooledObject<F> {
    fn new(value: F::Object, pool: Arc<Shared<F>>) -> Self {
        Self {
            value: Some(value),
            pool,
        }
    }

    /// Return the instance to its pool now
    pub fn release(self) {
        drop(self);
    }

    /// Take the instance out of the pool's accounting for good
    pub fn detach(mut self) -> F::Object {
        let value = self.value.take().expect("Value already taken");
        self.pool.forget();
        value
    }
}

impl<F: ObjectFactory> Deref for PooledObject<F> {
    type Target = F::Object;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<F: ObjectFactory> DerefMut for PooledObject<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<F: ObjectFactory> Drop for PooledObject<F> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}

impl<F> fmt::Debug for PooledObject<F>
where
    F: ObjectFactory,
    F::Object: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("pool", &self.pool.name)
            .field("value", &self.value)
            .finish()
    }
}

struct Shared<F: ObjectFactory> {
    name: String,
    policy: LimitingPolicy,
    timeout: Duration,
    factory: Arc<F>,
    controller: Arc<dyn PoolController>,
    state: Mutex<PoolCore<F::Object>>,
    available: Condvar,
    metrics: MetricsTracker,
    resize_token: Option<u64>,
}

impl<F: ObjectFactory> Shared<F> {
    fn create_instance(&self) -> PoolResult<F::Object> {
        match self.factory.create() {
            Ok(object) => {
                MetricsTracker::record(&self.metrics.total_created);
                Ok(object)
            }
            Err(err) => {
                MetricsTracker::record(&self.metrics.creation_failures);
                debug!(pool = %self.name, error = %err, "factory failed to create instance");
                Err(PoolError::creation(err))
            }
        }
    }

    /// Create up to `count` instances, stopping at the first failure
    fn create_batch(&self, count: usize) -> (Vec<F::Object>, Option<PoolError>) {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            match self.create_instance() {
                Ok(object) => created.push(object),
                Err(err) => return (created, Some(err)),
            }
        }
        (created, None)
    }

    fn retire_instance(&self, object: F::Object) {
        MetricsTracker::record(&self.metrics.total_retired);
        if let Err(err) = self.factory.retire(object) {
            MetricsTracker::record(&self.metrics.retire_failures);
            warn!(pool = %self.name, error = %err, "failed to retire instance");
        }
    }

    fn retire_all(&self, objects: Vec<F::Object>) {
        for object in objects {
            self.retire_instance(object);
        }
    }

    fn release(&self, mut object: F::Object) {
        MetricsTracker::record(&self.metrics.total_released);
        object.recycle();
        let rejected = self.state.lock().admit(object);
        self.available.notify_one();
        match rejected {
            Some(object) => {
                trace!(pool = %self.name, "retiring released instance");
                self.retire_instance(object);
            }
            None => trace!(pool = %self.name, "instance returned to pool"),
        }
    }

    fn forget(&self) {
        self.state.lock().forget();
        self.available.notify_one();
    }
}

impl<F: ObjectFactory> Drop for Shared<F> {
    fn drop(&mut self) {
        let ready = self.state.get_mut().dispose();
        self.retire_all(ready);
    }
}

enum Next<T> {
    Ready(T),
    Create,
    Bulk(usize),
}

/// Thread-safe pool of instances built by an [`ObjectFactory`].
///
/// `Pool` is a cheap handle; clones share the same ready set.
///
/// # Examples
///
/// ```
/// use poolkit::{FnFactory, LimitingPolicy, Pool, PoolConfiguration};
///
/// let config = PoolConfiguration::new()
///     .with_policy(LimitingPolicy::HardLimit)
///     .with_max_size(2);
/// let pool = Pool::new(FnFactory::infallible(|| Vec::<u8>::new()), config).unwrap();
///
/// {
///     let mut buf = pool.acquire().unwrap();
///     buf.push(1);
///     // Returned (and cleared) when `buf` goes out of scope
/// }
///
/// assert_eq!(pool.ready_count(), 1);
/// assert!(pool.acquire().unwrap().is_empty());
/// ```
pub struct Pool<F: ObjectFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ObjectFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ObjectFactory> Pool<F> {
    /// Create a pool that owns its factory
    pub fn new(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        Self::build(Arc::new(factory), config, None)
    }

    /// Create a pool sharing an existing factory
    pub fn with_factory(factory: Arc<F>, config: PoolConfiguration) -> PoolResult<Self> {
        Self::build(factory, config, None)
    }

    /// Create a pool together with the only handle allowed to resize it
    pub fn with_resize_handle(
        factory: Arc<F>,
        config: PoolConfiguration,
    ) -> PoolResult<(Self, ResizeHandle)> {
        let handle = ResizeHandle::mint();
        let pool = Self::build(factory, config, Some(handle.token()))?;
        Ok((pool, handle))
    }

    fn build(factory: Arc<F>, config: PoolConfiguration, resize_token: Option<u64>) -> PoolResult<Self> {
        config.validate()?;

        let ceiling = config.policy.is_limiting().then_some(config.max_size);
        let prefill = match config.policy {
            LimitingPolicy::Timeout => config.max_size,
            _ => config.min_size,
        };

        let shared = Arc::new(Shared {
            name: config.display_name(),
            policy: config.policy,
            timeout: config.timeout,
            controller: config.resolve_controller(),
            factory,
            state: Mutex::new(PoolCore::new(config.min_size, ceiling)),
            available: Condvar::new(),
            metrics: MetricsTracker::new(),
            resize_token,
        });

        let (objects, failure) = shared.create_batch(prefill);
        if let Some(err) = failure {
            // Dropping `shared` retires whatever was stocked
            shared.state.lock().stock(objects);
            return Err(err);
        }
        shared.state.lock().stock(objects);

        debug!(
            pool = %shared.name,
            policy = %shared.policy,
            min_size = config.min_size,
            max_size = config.max_size,
            prefill,
            "created pool"
        );

        Ok(Self { shared })
    }

    /// Acquire an instance.
    ///
    /// Timeout pools wait at most the configured timeout; hard-limit pools
    /// wait indefinitely; the other policies never wait.
    pub fn acquire(&self) -> PoolResult<PooledObject<F>> {
        match self.shared.policy {
            LimitingPolicy::Timeout => self.acquire_timeout(self.shared.timeout),
            _ => self.acquire_timeout(Duration::ZERO),
        }
    }

    /// Acquire an instance, waiting at most `timeout` if the policy blocks.
    /// `Duration::ZERO` waits indefinitely.
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledObject<F>> {
        let deadline = if timeout.is_zero() {
            None
        } else {
            Instant::now().checked_add(timeout)
        };
        match self.acquire_inner(true, deadline, timeout)? {
            Some(object) => Ok(object),
            None => Err(PoolError::AcquireTimeout(timeout)),
        }
    }

    /// Acquire without waiting; `Ok(None)` when a blocking policy is exhausted
    pub fn try_acquire(&self) -> PoolResult<Option<PooledObject<F>>> {
        self.acquire_inner(false, None, Duration::ZERO)
    }

    /// Acquire on tokio's blocking pool so async callers never park a worker
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<F>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.acquire())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    fn acquire_inner(
        &self,
        wait: bool,
        deadline: Option<Instant>,
        timeout: Duration,
    ) -> PoolResult<Option<PooledObject<F>>> {
        let shared = &self.shared;
        let next = {
            let mut state = shared.state.lock();
            let mut timed_out = false;
            loop {
                if state.is_disposed() {
                    return Err(PoolError::Disposed);
                }
                if let Some(object) = state.take_ready() {
                    break Next::Ready(object);
                }
                match shared.policy {
                    LimitingPolicy::Unbounded => {
                        state.reserve();
                        break Next::Create;
                    }
                    LimitingPolicy::SoftLimit => {
                        let wanted = shared.controller.grow(state.active()).max(1);
                        let count = state.room().map_or(wanted, |room| wanted.min(room)).max(1);
                        state.reserve();
                        break Next::Bulk(count);
                    }
                    LimitingPolicy::HardLimit | LimitingPolicy::Timeout => {
                        if state.has_room() {
                            state.reserve();
                            break Next::Create;
                        }
                        if !wait {
                            return Ok(None);
                        }
                        if timed_out {
                            MetricsTracker::record(&shared.metrics.acquire_timeouts);
                            debug!(pool = %shared.name, ?timeout, "acquire timed out");
                            return Err(PoolError::AcquireTimeout(timeout));
                        }
                        match deadline {
                            Some(deadline) => {
                                timed_out = shared.available.wait_until(&mut state, deadline).timed_out();
                            }
                            None => shared.available.wait(&mut state),
                        }
                    }
                }
            }
        };

        let object = match next {
            Next::Ready(object) => object,
            Next::Create => self.create_reserved()?,
            Next::Bulk(count) => {
                let object = self.create_reserved()?;
                self.stock_extra(count - 1);
                object
            }
        };

        MetricsTracker::record(&shared.metrics.total_acquired);
        trace!(pool = %shared.name, "instance acquired");
        Ok(Some(PooledObject::new(object, Arc::clone(shared))))
    }

    /// Fill a slot reserved under the lock; gives the slot back on failure
    fn create_reserved(&self) -> PoolResult<F::Object> {
        self.shared.create_instance().inspect_err(|_| self.shared.forget())
    }

    fn stock_extra(&self, count: usize) {
        if count == 0 {
            return;
        }
        let (objects, failure) = self.shared.create_batch(count);
        if let Some(err) = failure {
            warn!(pool = %self.shared.name, requested = count, created = objects.len(), error = %err, "bulk grow stopped early");
        }
        // Concurrent acquirers size their batches independently
        let rejected = self.shared.state.lock().stock_within_ceiling(objects);
        if !rejected.is_empty() {
            debug!(pool = %self.shared.name, surplus = rejected.len(), "retiring bulk grow surplus");
        }
        self.shared.retire_all(rejected);
    }

    /// Construct an unpooled instance straight from the factory
    pub fn create(&self) -> PoolResult<F::Object> {
        self.shared.create_instance()
    }

    /// Shut the pool down: retire every ready instance and fail all current
    /// and future acquirers with [`PoolError::Disposed`]. Instances released
    /// afterwards are retired.
    pub fn dispose(&self) {
        let (ready, was_disposed) = {
            let mut state = self.shared.state.lock();
            let was_disposed = state.is_disposed();
            (state.dispose(), was_disposed)
        };
        self.shared.available.notify_all();
        if !was_disposed {
            debug!(pool = %self.shared.name, retiring = ready.len(), "disposing pool");
        }
        self.shared.retire_all(ready);
    }

    fn authorize(&self, handle: &ResizeHandle) -> PoolResult<()> {
        match self.shared.resize_token {
            Some(token) if token == handle.token() => Ok(()),
            _ => {
                error!(pool = %self.shared.name, "rejected resize with foreign handle");
                Err(PoolError::UnauthorizedResize)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn policy(&self) -> LimitingPolicy {
        self.shared.policy
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.shared.factory
    }

    pub fn ready_count(&self) -> usize {
        self.shared.state.lock().ready_len()
    }

    /// Instances handed out, plus slots reserved for instances still being
    /// created by an acquirer
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active()
    }

    /// Ready plus active, so in-flight creations count too
    pub fn total_count(&self) -> usize {
        self.shared.state.lock().total()
    }

    /// Current ceiling, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.shared.state.lock().ceiling()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().is_disposed()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let state = self.shared.state.lock();
        self.shared
            .metrics
            .get_metrics(state.active(), state.ready_len(), state.ceiling())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format, labelled with the pool name
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.get_metrics(), self.name(), tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let state = self.shared.state.lock();
        HealthStatus::new(state.ready_len(), state.active(), state.ceiling(), state.is_disposed())
    }
}

impl<F: ObjectFactory> ManagablePool for Pool<F> {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn grow(&self, amount: usize, handle: &ResizeHandle) -> PoolResult<usize> {
        self.authorize(handle)?;
        if amount == 0 {
            return Ok(0);
        }

        if self.is_disposed() {
            return Err(PoolError::Disposed);
        }

        let (objects, failure) = self.shared.create_batch(amount);
        let created = objects.len();
        let (rejected, disposed) = {
            let mut state = self.shared.state.lock();
            let disposed = state.is_disposed();
            if !disposed {
                state.raise_ceiling(created);
            }
            (state.stock(objects), disposed)
        };
        self.shared.retire_all(rejected);
        if disposed {
            return Err(PoolError::Disposed);
        }
        self.shared.available.notify_all();

        match failure {
            Some(err) if created == 0 => Err(err),
            Some(err) => {
                warn!(pool = %self.shared.name, requested = amount, created, error = %err, "grow stopped early");
                Ok(created)
            }
            None => {
                debug!(pool = %self.shared.name, amount, "grew pool");
                Ok(created)
            }
        }
    }

    fn shrink(&self, amount: usize, handle: &ResizeHandle) -> PoolResult<usize> {
        self.authorize(handle)?;
        let retired = {
            let mut state = self.shared.state.lock();
            if state.is_disposed() {
                return Err(PoolError::Disposed);
            }
            state.lower_ceiling(amount);
            state.shrink_ready(amount)
        };
        let count = retired.len();
        self.shared.retire_all(retired);
        debug!(pool = %self.shared.name, requested = amount, retired = count, "shrank pool");
        Ok(count)
    }

    fn size(&self, handle: &ResizeHandle) -> PoolResult<usize> {
        self.authorize(handle)?;
        Ok(self.ready_count())
    }

    fn dispose(&self) {
        Pool::dispose(self);
    }
}

impl<F: ObjectFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Pool")
            .field("name", &self.shared.name)
            .field("policy", &self.shared.policy)
            .field("ready", &state.ready_len())
            .field("active", &state.active())
            .field("capacity", &state.ceiling())
            .field("disposed", &state.is_disposed())
            .finish()
    }
}
