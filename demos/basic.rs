//! Basic usage of the pool variants

use poolkit::{
    FnFactory, LimitingPolicy, LocalPool, Pool, PoolConfiguration, PoolError, PoolManager,
    RebalanceConfiguration,
};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== poolkit - Basic Examples ===\n");

    // Example 1: Unbounded pool
    unbounded_pool();

    // Example 2: Hard-limit pool with try_acquire
    hard_limit_pool();

    // Example 3: Timeout pool
    timeout_pool();

    // Example 4: Single-owner pool
    local_pool();

    // Example 5: Managed pool and metrics
    managed_pool();
}

fn unbounded_pool() {
    println!("1. Unbounded Pool:");
    let pool = Pool::new(FnFactory::infallible(|| 42u32), PoolConfiguration::default()).unwrap();

    {
        let obj = pool.acquire().unwrap();
        println!("   Got object: {}", *obj);
        // Returned when dropped
    }

    println!("   Ready after return: {}\n", pool.ready_count());
}

fn hard_limit_pool() {
    println!("2. Hard-Limit Pool:");
    let config = PoolConfiguration::new()
        .with_policy(LimitingPolicy::HardLimit)
        .with_max_size(1);
    let pool = Pool::new(FnFactory::infallible(String::new), config).unwrap();

    let first = pool.try_acquire().unwrap();
    println!("   First try: {}", if first.is_some() { "Success" } else { "None" });

    let second = pool.try_acquire().unwrap();
    println!("   Second try: {}", if second.is_some() { "Success" } else { "None (at ceiling)" });

    drop(first);
    println!("   Third try: {}\n", if pool.try_acquire().unwrap().is_some() { "Success" } else { "None" });
}

fn timeout_pool() {
    println!("3. Timeout Pool:");
    let config = PoolConfiguration::new()
        .with_policy(LimitingPolicy::Timeout)
        .with_max_size(2)
        .with_timeout(Duration::from_millis(50));
    let pool = Pool::new(FnFactory::infallible(|| vec![0u8; 16]), config).unwrap();

    let _a = pool.acquire().unwrap();
    let _b = pool.acquire().unwrap();
    match pool.acquire() {
        Err(PoolError::AcquireTimeout(waited)) => println!("   Timed out after {:?}\n", waited),
        other => println!("   Unexpected: {:?}\n", other.map(|_| ())),
    }
}

fn local_pool() {
    println!("4. Single-Owner Pool:");
    let mut pool = LocalPool::new(Arc::new(FnFactory::infallible(String::new)), 2).unwrap();

    let mut scratch = pool.acquire().unwrap();
    scratch.push_str("temporary");
    pool.release(scratch);

    let reused = pool.acquire().unwrap();
    println!("   Reused instance is empty: {}", reused.is_empty());
    pool.release(reused);
    println!("   Ready: {}\n", pool.ready_count());
}

fn managed_pool() {
    println!("5. Managed Pool:");
    let manager = PoolManager::new(RebalanceConfiguration::default()).unwrap();
    let factory = Arc::new(FnFactory::infallible(|| Vec::<u8>::with_capacity(1024)));

    let pool = manager.get_managed_pool(factory, 2).unwrap();
    println!("   Ready before rebalancing: {}", pool.ready_count());
    let report = manager.rebalance_now();
    println!("   Rebalanced {} pool(s), ready now: {}", report.grown, pool.ready_count());

    {
        let _buf = pool.acquire().unwrap();
        let health = pool.get_health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Active: {}, Ready: {}", health.active_objects, health.ready_objects);
    }

    println!("\n   Metrics:");
    for (key, value) in pool.export_metrics() {
        println!("     {}: {}", key, value);
    }
}
