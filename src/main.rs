// poolkit demo
//
// This is just a binary wrapper - the actual library is in lib.rs
// Run with: RUST_LOG=poolkit=debug cargo run

use poolkit::{FnFactory, PoolManager, PoolResult, RebalanceConfiguration, ThreadScheduler};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== poolkit ===");

    let scheduler = Arc::new(ThreadScheduler::new());
    let config = RebalanceConfiguration::default()
        .with_interval(Duration::from_millis(100), Duration::from_millis(100));
    let manager = PoolManager::with_scheduler(config, scheduler.clone())?;

    let factory = Arc::new(FnFactory::infallible(|| Vec::<u8>::with_capacity(4096)));
    let pool = manager.get_managed_pool(factory, 2)?;
    println!("  Ready after registration: {}", pool.ready_count());

    {
        let mut buffer = pool.acquire()?;
        buffer.extend_from_slice(b"hello");
        println!("  Got buffer holding {} bytes", buffer.len());
    }

    thread::sleep(Duration::from_millis(250));
    println!("  Ready after rebalancing: {}", pool.ready_count());

    scheduler.shutdown();
    manager.dispose();
    Ok(())
}
