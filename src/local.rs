//! Single-owner pool
//!
//! `LocalPool` has no internal locking: every mutating operation takes
//! `&mut self`, so the borrow checker enforces the single-owner contract.
//! Instances are handed out by value and given back with `release`.

use crate::state::PoolCore;
use crate::errors::{PoolError, PoolResult};
use crate::factory::{ObjectFactory, Poolable};

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pool with a fixed backing capacity for a single owner.
///
/// When the ready set is empty `acquire` creates an instance directly
/// instead of waiting. Releases beyond the backing capacity are retired.
///
/// # Examples
///
/// ```
/// use poolkit::{FnFactory, LocalPool};
/// use std::sync::Arc;
///
/// let mut pool = LocalPool::new(Arc::new(FnFactory::infallible(String::new)), 2).unwrap();
/// let mut s = pool.acquire().unwrap();
/// s.push_str("scratch");
/// pool.release(s);
///
/// assert_eq!(pool.ready_count(), 2);
/// assert!(pool.acquire().unwrap().is_empty());
/// ```
pub struct LocalPool<F: ObjectFactory> {
    factory: Arc<F>,
    core: PoolCore<F::Object>,
}

impl<F: ObjectFactory> LocalPool<F> {
    /// Create a pool pre-filled to `capacity`
    pub fn new(factory: Arc<F>, capacity: usize) -> PoolResult<Self> {
        Self::with_floor(factory, 0, capacity)
    }

    /// Create a pool pre-filled to `capacity` that never shrinks below
    /// `min_size` ready instances
    pub fn with_floor(factory: Arc<F>, min_size: usize, capacity: usize) -> PoolResult<Self> {
        if capacity == 0 || min_size > capacity {
            return Err(PoolError::InvalidConfiguration(format!(
                "single-owner pool needs capacity ({}) >= 1 and min_size ({}) <= capacity",
                capacity, min_size
            )));
        }

        let mut pool = Self {
            factory,
            core: PoolCore::new(min_size, Some(capacity)),
        };
        let objects = pool.create_batch(capacity)?;
        pool.core.stock(objects);
        Ok(pool)
    }

    /// Take a ready instance, or create one when none is ready
    pub fn acquire(&mut self) -> PoolResult<F::Object> {
        if self.core.is_disposed() {
            return Err(PoolError::Disposed);
        }
        if let Some(object) = self.core.take_ready() {
            return Ok(object);
        }
        let object = self.create()?;
        self.core.reserve();
        Ok(object)
    }

    /// Give an acquired instance back
    pub fn release(&mut self, mut object: F::Object) {
        object.recycle();
        if let Some(object) = self.core.admit(object) {
            self.retire(object);
        }
    }

    /// Construct an unpooled instance straight from the factory
    pub fn create(&self) -> PoolResult<F::Object> {
        self.factory.create().map_err(PoolError::creation)
    }

    /// Add `amount` ready instances and raise the capacity to match
    pub fn grow(&mut self, amount: usize) -> PoolResult<usize> {
        if self.core.is_disposed() {
            return Err(PoolError::Disposed);
        }
        let objects = self.create_batch(amount)?;
        self.core.raise_ceiling(amount);
        self.core.stock(objects);
        debug!(amount, "grew single-owner pool");
        Ok(amount)
    }

    /// Retire up to `amount` ready instances, never going below the floor,
    /// and lower the capacity
    pub fn shrink(&mut self, amount: usize) -> usize {
        self.core.lower_ceiling(amount);
        let retired = self.core.shrink_ready(amount);
        let count = retired.len();
        for object in retired {
            self.retire(object);
        }
        count
    }

    /// Retire every ready instance; later releases are retired too
    pub fn dispose(&mut self) {
        for object in self.core.dispose() {
            self.retire(object);
        }
    }

    /// All or nothing: a failure retires what was already built
    fn create_batch(&self, count: usize) -> PoolResult<Vec<F::Object>> {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            match self.create() {
                Ok(object) => created.push(object),
                Err(err) => {
                    for object in created {
                        self.retire(object);
                    }
                    return Err(err);
                }
            }
        }
        Ok(created)
    }

    fn retire(&self, object: F::Object) {
        if let Err(err) = self.factory.retire(object) {
            warn!(error = %err, "failed to retire instance");
        }
    }

    pub fn ready_count(&self) -> usize {
        self.core.ready_len()
    }

    pub fn active_count(&self) -> usize {
        self.core.active()
    }

    pub fn capacity(&self) -> usize {
        self.core.ceiling().unwrap_or_default()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl<F: ObjectFactory> Drop for LocalPool<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<F: ObjectFactory> fmt::Debug for LocalPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPool")
            .field("ready", &self.core.ready_len())
            .field("active", &self.core.active())
            .field("capacity", &self.core.ceiling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FnFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<FnFactory<usize>>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let retired = Arc::new(AtomicUsize::new(0));
        let next = Arc::clone(&created);
        let gone = Arc::clone(&retired);
        let factory = FnFactory::infallible(move || next.fetch_add(1, Ordering::SeqCst)).with_retire(move |_| {
            gone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (Arc::new(factory), created, retired)
    }

    #[test]
    fn test_falls_back_to_creation_when_exhausted() {
        let (factory, created, retired) = counting();
        let mut pool = LocalPool::new(factory, 1).unwrap();

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.active_count(), 2);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.ready_count(), 1);
        assert_eq!(retired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lifo_order() {
        let (factory, _, _) = counting();
        let mut pool = LocalPool::new(factory, 3).unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        pool.release(b);
        pool.release(a);
        assert_eq!(pool.acquire().unwrap(), a);
    }

    #[test]
    fn test_grow_and_shrink_respect_floor() {
        let (factory, created, retired) = counting();
        let mut pool = LocalPool::with_floor(factory, 2, 3).unwrap();

        assert_eq!(pool.grow(2).unwrap(), 2);
        assert_eq!(pool.capacity(), 5);
        assert_eq!(created.load(Ordering::SeqCst), 5);

        assert_eq!(pool.shrink(10), 3);
        assert_eq!(pool.ready_count(), 2);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(retired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dispose() {
        let (factory, _, retired) = counting();
        let mut pool = LocalPool::new(factory, 2).unwrap();
        let held = pool.acquire().unwrap();
        pool.dispose();
        assert_eq!(pool.acquire(), Err(PoolError::Disposed));
        pool.release(held);
        assert_eq!(retired.load(Ordering::SeqCst), 2);
        assert_eq!(pool.ready_count(), 0);
    }

    #[test]
    fn test_rejects_bad_bounds() {
        let (factory, _, _) = counting();
        assert!(LocalPool::new(Arc::clone(&factory), 0).is_err());
        assert!(LocalPool::with_floor(factory, 3, 2).is_err());
    }
}
