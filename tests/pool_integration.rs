//! Integration tests for the pool variants
//!
//! These exercise the pools from several threads at once and check the
//! ownership, capacity and disposal guarantees end to end.

use parking_lot::Mutex;
use poolkit::{
    FactoryError, LimitingPolicy, ManagablePool, ObjectFactory, Pool, PoolConfiguration, PoolError,
    Poolable,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Session {
    id: usize,
}

impl Poolable for Session {}

#[derive(Default)]
struct CountingFactory {
    created: AtomicUsize,
    retired: AtomicUsize,
}

impl CountingFactory {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn retired(&self) -> usize {
        self.retired.load(Ordering::SeqCst)
    }
}

impl ObjectFactory for CountingFactory {
    type Object = Session;

    fn create(&self) -> Result<Session, FactoryError> {
        Ok(Session {
            id: self.created.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn retire(&self, _session: Session) -> Result<(), FactoryError> {
        self.retired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn pool(config: PoolConfiguration) -> (Pool<CountingFactory>, Arc<CountingFactory>) {
    let factory = Arc::new(CountingFactory::default());
    let pool = Pool::with_factory(Arc::clone(&factory), config).unwrap();
    (pool, factory)
}

fn hammer(pool: &Pool<CountingFactory>, threads: usize, rounds: usize, check: impl Fn(&Pool<CountingFactory>) + Send + Sync) {
    let in_use = Mutex::new(HashSet::new());
    thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..rounds {
                    let session = pool.acquire().unwrap();
                    assert!(in_use.lock().insert(session.id), "session {} handed out twice", session.id);
                    check(pool);
                    thread::yield_now();
                    assert!(in_use.lock().remove(&session.id));
                    session.release();
                }
            });
        }
    });
}

#[test]
fn test_no_double_handout_unbounded() {
    let (pool, _) = pool(PoolConfiguration::default());
    hammer(&pool, 8, 200, |_| {});
    assert_eq!(pool.active_count(), 0);
}

#[test]
fn test_no_double_handout_soft_limit() {
    let (pool, factory) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::SoftLimit)
            .with_min_size(2)
            .with_max_size(6),
    );
    hammer(&pool, 8, 200, |_| {});
    assert_eq!(pool.active_count(), 0);
    assert!(pool.ready_count() <= 6);
    assert_eq!(factory.created() - factory.retired(), pool.ready_count());
}

#[test]
fn test_hard_limit_never_exceeds_ceiling() {
    let (pool, factory) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::HardLimit)
            .with_max_size(3),
    );
    hammer(&pool, 8, 200, |pool| assert!(pool.total_count() <= 3));
    assert!(factory.created() <= 3);
    assert_eq!(pool.active_count(), 0);
}

#[test]
fn test_timeout_pool_never_exceeds_ceiling() {
    let (pool, factory) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::Timeout)
            .with_max_size(2)
            .with_timeout(Duration::from_secs(10)),
    );
    hammer(&pool, 6, 100, |pool| assert!(pool.total_count() <= 2));
    assert_eq!(factory.created(), 2);
}

#[test]
fn test_fixed_pool_hands_released_instance_to_waiter() {
    let (pool, factory) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::Timeout)
            .with_max_size(3)
            .with_timeout(Duration::from_millis(100)),
    );

    let first = pool.acquire().unwrap();
    let _second = pool.acquire().unwrap();
    let _third = pool.acquire().unwrap();
    assert_eq!(factory.created(), 3);

    let released_id = first.id;
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire_timeout(Duration::from_millis(500)).map(|s| s.id))
    };
    thread::sleep(Duration::from_millis(20));
    first.release();

    assert_eq!(waiter.join().unwrap(), Ok(released_id));
    assert_eq!(factory.created(), 3);
}

#[test]
fn test_timeout_is_bounded() {
    let (pool, _) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::Timeout)
            .with_max_size(1)
            .with_timeout(Duration::from_millis(100)),
    );
    let _held = pool.acquire().unwrap();

    let started = Instant::now();
    let result = pool.acquire();
    let elapsed = started.elapsed();

    assert_eq!(result.unwrap_err(), PoolError::AcquireTimeout(Duration::from_millis(100)));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);
}

#[test]
fn test_release_racing_dispose_always_retires() {
    for _ in 0..20 {
        let (pool, factory) = pool(PoolConfiguration::new().with_min_size(8));
        let held: Vec<_> = (0..8).map(|_| pool.acquire().unwrap()).collect();
        let barrier = Barrier::new(held.len() + 1);

        thread::scope(|scope| {
            for session in held {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    session.release();
                });
            }
            barrier.wait();
            pool.dispose();
        });

        assert_eq!(pool.ready_count(), 0);
        assert_eq!(factory.retired(), factory.created());
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Disposed);
    }
}

#[test]
fn test_dispose_releases_every_waiter() {
    let (pool, _) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::HardLimit)
            .with_max_size(1),
    );
    let _held = pool.acquire().unwrap();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|_| ()))
        })
        .collect();
    thread::sleep(Duration::from_millis(30));
    pool.dispose();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), Err(PoolError::Disposed));
    }
}

#[test]
fn test_shrink_never_goes_below_floor() {
    let factory = Arc::new(CountingFactory::default());
    let config = PoolConfiguration::new().with_min_size(3);
    let (pool, handle) = Pool::with_resize_handle(Arc::clone(&factory), config).unwrap();

    pool.grow(5, &handle).unwrap();
    assert_eq!(pool.size(&handle), Ok(8));

    for requested in [1, 100, usize::MAX] {
        pool.shrink(requested, &handle).unwrap();
        assert!(pool.size(&handle).unwrap() >= 3);
    }
    assert_eq!(pool.size(&handle), Ok(3));
    assert_eq!(factory.retired(), 5);
}

#[test]
fn test_foreign_handle_leaves_size_unchanged() {
    let factory = Arc::new(CountingFactory::default());
    let (pool, _own) = Pool::with_resize_handle(Arc::clone(&factory), PoolConfiguration::new().with_min_size(2)).unwrap();
    let (_other, foreign) = Pool::with_resize_handle(Arc::clone(&factory), PoolConfiguration::default()).unwrap();

    assert_eq!(pool.grow(10, &foreign), Err(PoolError::UnauthorizedResize));
    assert_eq!(pool.shrink(10, &foreign), Err(PoolError::UnauthorizedResize));
    assert_eq!(pool.size(&foreign), Err(PoolError::UnauthorizedResize));
    assert_eq!(pool.ready_count(), 2);
    assert_eq!(factory.created(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_acquire_waits_without_blocking_runtime() {
    let (pool, _) = pool(
        PoolConfiguration::new()
            .with_policy(LimitingPolicy::HardLimit)
            .with_max_size(1),
    );
    let held = pool.acquire().unwrap();
    let held_id = held.id;

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_async().await.map(|s| s.id) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    held.release();

    assert_eq!(waiter.await.unwrap(), Ok(held_id));
}
