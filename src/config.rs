//! Pool and rebalancing configuration

use crate::controller::{FixedController, HalfSpanController, PoolController};
use crate::errors::{PoolError, PoolResult};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a pool limits its size and what `acquire` does when nothing is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum LimitingPolicy {
    /// No ceiling; creates a new instance whenever the ready set is empty
    #[default]
    Unbounded,

    /// Bulk-grows through the controller when empty; instances released
    /// above the ceiling are retired instead of kept
    SoftLimit,

    /// Never exceeds the ceiling; `acquire` blocks until an instance is
    /// released or capacity allows a creation
    HardLimit,

    /// Pre-filled to the ceiling; `acquire` waits at most the configured
    /// timeout before failing
    Timeout,
}

impl LimitingPolicy {
    /// Whether `max_size` is enforced as a ceiling
    pub fn is_limiting(&self) -> bool {
        !matches!(self, LimitingPolicy::Unbounded)
    }

    /// Whether `acquire` may park the calling thread
    pub fn may_block(&self) -> bool {
        matches!(self, LimitingPolicy::HardLimit | LimitingPolicy::Timeout)
    }
}

impl fmt::Display for LimitingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LimitingPolicy::Unbounded => "unbounded",
            LimitingPolicy::SoftLimit => "soft-limit",
            LimitingPolicy::HardLimit => "hard-limit",
            LimitingPolicy::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use poolkit::{LimitingPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_policy(LimitingPolicy::Timeout)
///     .with_max_size(3)
///     .with_timeout(Duration::from_millis(100));
///
/// assert_eq!(config.max_size, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Name used in logs and metrics labels
    pub name: Option<String>,

    /// Floor: instances created up front and never shrunk away
    pub min_size: usize,

    /// Ceiling for limiting policies
    pub max_size: usize,

    /// Limiting discipline
    pub policy: LimitingPolicy,

    /// Default wait for [`LimitingPolicy::Timeout`] pools; zero waits forever
    pub timeout: Duration,

    /// Bulk grow/shrink policy; defaults to [`HalfSpanController`]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub controller: Option<Arc<dyn PoolController>>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            name: None,
            min_size: 0,
            max_size: 100,
            policy: LimitingPolicy::Unbounded,
            timeout: Duration::from_secs(30),
            controller: None,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_policy(mut self, policy: LimitingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the default acquire timeout; `Duration::ZERO` waits indefinitely
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_controller(mut self, controller: Arc<dyn PoolController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Check the floor/ceiling relationship
    pub fn validate(&self) -> PoolResult<()> {
        if self.policy.is_limiting() {
            if self.max_size == 0 {
                return Err(PoolError::InvalidConfiguration(format!(
                    "max_size must be at least 1 for a {} pool",
                    self.policy
                )));
            }
            if self.min_size > self.max_size {
                return Err(PoolError::InvalidConfiguration(format!(
                    "min_size ({}) exceeds max_size ({})",
                    self.min_size, self.max_size
                )));
            }
        }
        Ok(())
    }

    /// The configured controller, or the half-span default
    pub(crate) fn resolve_controller(&self) -> Arc<dyn PoolController> {
        match self.controller {
            Some(ref controller) => Arc::clone(controller),
            None => Arc::new(HalfSpanController::new(self.min_size, self.max_size)),
        }
    }

    pub(crate) fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("{}-pool", self.policy))
    }
}

/// Configuration for the background rebalancing task
///
/// # Examples
///
/// ```
/// use poolkit::RebalanceConfiguration;
///
/// let config = RebalanceConfiguration::default();
/// assert_eq!(config.low_water_mark, 4);
/// assert_eq!(config.high_water_mark, 256);
/// assert_eq!(config.increment, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RebalanceConfiguration {
    /// Grow pools whose ready count falls below this
    pub low_water_mark: usize,

    /// Shrink pools whose ready count rises above this
    pub high_water_mark: usize,

    /// Instances added or removed per tick
    pub increment: usize,

    /// Delay before the first tick
    pub initial_delay: Duration,

    /// Delay between ticks
    pub interval: Duration,

    /// Number of ticks; `None` repeats until the scheduler stops
    pub repeat: Option<usize>,
}

impl Default for RebalanceConfiguration {
    fn default() -> Self {
        Self {
            low_water_mark: 4,
            high_water_mark: 256,
            increment: 4,
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            repeat: None,
        }
    }
}

impl RebalanceConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_water_marks(mut self, low: usize, high: usize) -> Self {
        self.low_water_mark = low;
        self.high_water_mark = high;
        self
    }

    pub fn with_increment(mut self, increment: usize) -> Self {
        self.increment = increment;
        self
    }

    pub fn with_interval(mut self, initial_delay: Duration, interval: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.interval = interval;
        self
    }

    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.low_water_mark > self.high_water_mark {
            return Err(PoolError::InvalidConfiguration(format!(
                "low_water_mark ({}) exceeds high_water_mark ({})",
                self.low_water_mark, self.high_water_mark
            )));
        }
        if self.increment == 0 {
            return Err(PoolError::InvalidConfiguration(
                "increment must be at least 1".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn controller(&self) -> Arc<dyn PoolController> {
        Arc::new(FixedController::symmetric(self.increment))
    }
}
