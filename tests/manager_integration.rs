//! Integration tests for the pool manager and background rebalancing

use poolkit::{
    FnFactory, LimitingPolicy, PoolConfiguration, PoolManager, RebalanceConfiguration, ThreadScheduler,
    TokioScheduler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn counting_factory() -> (Arc<FnFactory<usize>>, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let factory = FnFactory::infallible(move || counter.fetch_add(1, Ordering::SeqCst));
    (Arc::new(factory), created)
}

fn fast_rebalancing() -> RebalanceConfiguration {
    RebalanceConfiguration::default().with_interval(Duration::from_millis(10), Duration::from_millis(10))
}

#[test]
fn test_one_tick_grows_by_increment() {
    let manager = PoolManager::new(RebalanceConfiguration::default()).unwrap();
    let (factory, created) = counting_factory();

    let pool = manager.get_managed_pool(factory, 2).unwrap();
    assert_eq!(pool.ready_count(), 2);
    assert_eq!(created.load(Ordering::SeqCst), 2);

    let report = manager.rebalance_now();
    assert_eq!(report.inspected, 1);
    assert_eq!(report.grown, 1);
    assert!(pool.ready_count() >= 4);
    assert_eq!(created.load(Ordering::SeqCst), 2 + 4);
}

#[test]
fn test_thread_scheduler_drives_rebalancing() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let manager = PoolManager::with_scheduler(fast_rebalancing(), scheduler.clone()).unwrap();
    let (factory, _) = counting_factory();

    let pool = manager.get_managed_pool(factory, 0).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.ready_count() < 4 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    scheduler.shutdown();

    // Below the low-water mark the pool grows; at 4 it is left alone
    assert_eq!(pool.ready_count(), 4);
}

#[test]
fn test_rebalancing_keeps_going_past_disposed_pool() {
    let manager = PoolManager::new(RebalanceConfiguration::default()).unwrap();
    let (first_factory, _) = counting_factory();
    let (second_factory, _) = counting_factory();

    let first = manager.get_managed_pool(first_factory, 0).unwrap();
    let second = manager.get_managed_pool(second_factory, 0).unwrap();
    first.dispose();

    let report = manager.rebalance_now();
    assert_eq!(report.inspected, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(second.ready_count(), 4);
}

#[test]
fn test_rebalancing_shrinks_idle_pool() {
    let config = RebalanceConfiguration::default().with_water_marks(1, 4).with_increment(3);
    let manager = PoolManager::new(config).unwrap();
    let (factory, _) = counting_factory();

    let pool = manager
        .get_managed_pool_with(
            factory,
            PoolConfiguration::new()
                .with_policy(LimitingPolicy::SoftLimit)
                .with_min_size(2)
                .with_max_size(10),
        )
        .unwrap();
    let held: Vec<_> = (0..9).map(|_| pool.acquire().unwrap()).collect();
    drop(held);
    assert!(pool.ready_count() > 4);

    manager.rebalance_now();
    manager.rebalance_now();
    manager.rebalance_now();
    assert!(pool.ready_count() <= 4);
    assert!(pool.ready_count() >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_scheduler_drives_rebalancing() {
    let scheduler = Arc::new(TokioScheduler::new().unwrap());
    let manager = PoolManager::with_scheduler(fast_rebalancing(), scheduler.clone()).unwrap();
    let (factory, created) = counting_factory();

    let pool = manager.get_managed_pool(factory, 1).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.ready_count() < 4 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    scheduler.shutdown();

    assert_eq!(pool.ready_count(), 5);
    assert_eq!(created.load(Ordering::SeqCst), 5);
}
