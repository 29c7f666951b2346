//! Capability-gated resizing

use crate::errors::PoolResult;
use std::fmt;

/// Authority to resize one pool.
///
/// A handle is minted together with its pool and cannot be cloned or built
/// outside this crate, so only whoever received it at registration time
/// (normally the [`PoolManager`](crate::PoolManager)) can grow or shrink that
/// pool. Presenting it to any other pool fails with
/// [`PoolError::UnauthorizedResize`](crate::PoolError::UnauthorizedResize).
///
/// This guards against cooperative misuse; it is not a security boundary.
pub struct ResizeHandle {
    token: u64,
}

impl ResizeHandle {
    pub(crate) fn mint() -> Self {
        Self {
            token: rand::random(),
        }
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }
}

impl fmt::Debug for ResizeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResizeHandle").finish_non_exhaustive()
    }
}

/// A pool whose capacity can be changed from outside by the holder of its
/// [`ResizeHandle`]
pub trait ManagablePool: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Eagerly construct `amount` ready instances and raise the ceiling by
    /// the number actually created. Returns that number.
    fn grow(&self, amount: usize, handle: &ResizeHandle) -> PoolResult<usize>;

    /// Retire up to `amount` ready instances without going below the floor,
    /// and lower the ceiling. Returns the number retired.
    fn shrink(&self, amount: usize, handle: &ResizeHandle) -> PoolResult<usize>;

    /// Current ready-instance count
    fn size(&self, handle: &ResizeHandle) -> PoolResult<usize>;

    /// Shut the pool down
    fn dispose(&self);
}
