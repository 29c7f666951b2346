//! Error types for the pool engine

use thiserror::Error;

/// Error type reported by [`ObjectFactory`](crate::ObjectFactory) implementations
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Factory failed to create an instance: {0}")]
    Creation(String),

    #[error("Pool has been disposed")]
    Disposed,

    #[error("Timed out after {0:?} waiting for an instance")]
    AcquireTimeout(std::time::Duration),

    #[error("Resize handle does not belong to this pool")]
    UnauthorizedResize,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Failed to schedule task: {0}")]
    Schedule(String),

    #[error("Failed to export metrics: {0}")]
    MetricsExport(String),
}

impl PoolError {
    pub(crate) fn creation(err: FactoryError) -> Self {
        PoolError::Creation(err.to_string())
    }

    /// Whether the caller may reasonably retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::AcquireTimeout(_) | PoolError::Creation(_))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
