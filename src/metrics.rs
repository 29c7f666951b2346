//! Metrics collection and export for pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use poolkit::{FnFactory, Pool, PoolConfiguration};
///
/// let pool = Pool::new(FnFactory::infallible(|| 0u32), PoolConfiguration::default()).unwrap();
///
/// {
///     let _obj = pool.acquire().unwrap();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.active_objects, 1);
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Instances constructed by the factory
    pub total_created: usize,

    /// Instances handed back to the factory for retirement
    pub total_retired: usize,

    /// Successful acquisitions
    pub total_acquired: usize,

    /// Releases, whether re-pooled or retired
    pub total_released: usize,

    /// Bounded waits that ran out
    pub acquire_timeouts: usize,

    /// Factory `create` failures
    pub creation_failures: usize,

    /// Factory `retire` failures (absorbed)
    pub retire_failures: usize,

    /// Current active objects, including slots reserved for in-flight creation
    pub active_objects: usize,

    /// Current ready objects
    pub ready_objects: usize,

    /// Current ceiling, `None` when unbounded
    pub capacity: Option<usize>,

    /// Active objects over capacity (0.0 to 1.0), zero when unbounded
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_retired".to_string(), self.total_retired.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("acquire_timeouts".to_string(), self.acquire_timeouts.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("retire_failures".to_string(), self.retire_failures.to_string());
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("ready_objects".to_string(), self.ready_objects.to_string());
        metrics.insert(
            "capacity".to_string(),
            self.capacity.map_or_else(|| "unbounded".to_string(), |c| c.to_string()),
        );
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use poolkit::{FnFactory, MetricsExporter, Pool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = Pool::new(FnFactory::infallible(|| 0u32), PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&pool.get_metrics(), "my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("pool_objects_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::errors::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let registry = Registry::new();
        let gauges = [
            ("pool_objects_active", "Current active objects", metrics.active_objects),
            ("pool_objects_ready", "Current ready objects", metrics.ready_objects),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(export_error)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(export_error)?;
        }

        let utilization =
            Gauge::with_opts(opts("pool_utilization", "Pool utilization ratio")).map_err(export_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(export_error)?;

        let counters = [
            ("pool_objects_created_total", "Instances created", metrics.total_created),
            ("pool_objects_retired_total", "Instances retired", metrics.total_retired),
            ("pool_acquired_total", "Successful acquisitions", metrics.total_acquired),
            ("pool_released_total", "Releases", metrics.total_released),
            ("pool_acquire_timeouts_total", "Acquire timeouts", metrics.acquire_timeouts),
            ("pool_creation_failures_total", "Factory create failures", metrics.creation_failures),
            ("pool_retire_failures_total", "Factory retire failures", metrics.retire_failures),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(export_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(export_error)
    }
}

#[cfg(feature = "metrics")]
fn export_error(err: impl std::fmt::Display) -> crate::errors::PoolError {
    crate::errors::PoolError::MetricsExport(err.to_string())
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_retired: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub acquire_timeouts: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub retire_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, active: usize, ready: usize, capacity: Option<usize>) -> PoolMetrics {
        let utilization = match capacity {
            Some(capacity) if capacity > 0 => active as f64 / capacity as f64,
            _ => 0.0,
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_retired: self.total_retired.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            retire_failures: self.retire_failures.load(Ordering::Relaxed),
            active_objects: active,
            ready_objects: ready,
            capacity,
            utilization,
        }
    }
}
