//! # poolkit
//!
//! Generic object pooling engine: one pool core shared by several limiting
//! disciplines, capability-gated resizing, and a manager that rebalances its
//! pools in the background.
//!
//! ## Features
//!
//! - Unbounded, soft-limit, hard-limit and timeout pools behind one `Pool` type
//! - Lock-free single-owner `LocalPool`
//! - Automatic return of instances via RAII (Drop trait)
//! - Optional reset of instances before reuse (`Poolable::recycle`)
//! - Pluggable grow/shrink controllers
//! - Resizing gated by a non-cloneable `ResizeHandle`
//! - `PoolManager` with periodic low/high-water-mark rebalancing
//! - Metrics, Prometheus export and health status
//!
//! ## Quick Start
//!
//! ```rust
//! use poolkit::{FnFactory, Pool, PoolConfiguration};
//!
//! let pool = Pool::new(FnFactory::infallible(|| 42u32), PoolConfiguration::default()).unwrap();
//! {
//!     let obj = pool.acquire().unwrap();
//!     println!("Got: {}", *obj);
//!     // Instance automatically returned when `obj` goes out of scope
//! }
//! assert_eq!(pool.ready_count(), 1);
//! ```

mod config;
mod controller;
mod state;
mod errors;
mod factory;
mod health;
mod local;
mod managed;
mod manager;
mod metrics;
mod pool;
mod rebalance;
mod scheduler;

pub use config::{LimitingPolicy, PoolConfiguration, RebalanceConfiguration};
pub use controller::{FixedController, HalfSpanController, PoolController};
pub use errors::{FactoryError, PoolError, PoolResult};
pub use factory::{FnFactory, ObjectFactory, Poolable};
pub use health::HealthStatus;
pub use local::LocalPool;
pub use managed::{ManagablePool, ResizeHandle};
pub use manager::PoolManager;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{Pool, PooledObject};
pub use rebalance::{RebalanceReport, Rebalancer};
pub use scheduler::{PeriodicTask, Scheduler, ThreadScheduler, TokioScheduler};
