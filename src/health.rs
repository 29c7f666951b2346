//! Health monitoring for pools

/// Health status of a pool
///
/// # Examples
///
/// ```
/// use poolkit::{FnFactory, Pool, PoolConfiguration};
///
/// let config = PoolConfiguration::new().with_min_size(3);
/// let pool = Pool::new(FnFactory::infallible(|| 0u32), config).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.ready_objects, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Active objects over capacity (0.0 to 1.0), zero when unbounded
    pub utilization: f64,

    /// Ready objects count
    pub ready_objects: usize,

    /// Active objects count
    pub active_objects: usize,

    /// Current ceiling, `None` when unbounded
    pub total_capacity: Option<usize>,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(ready: usize, active: usize, capacity: Option<usize>, disposed: bool) -> Self {
        let utilization = match capacity {
            Some(capacity) if capacity > 0 => active as f64 / capacity as f64,
            _ => 0.0,
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if disposed {
            warnings.push("Pool is disposed".to_string());
            is_healthy = false;
        }

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if ready == 0 && capacity.is_some_and(|c| active >= c) {
            warnings.push("Pool is exhausted".to_string());
        }

        Self {
            is_healthy,
            utilization,
            ready_objects: ready,
            active_objects: active,
            total_capacity: capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}
