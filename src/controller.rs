//! Grow/shrink policies

use std::fmt;

/// Decides how many instances a pool should add or remove.
///
/// Controllers are advisory: pools clamp the returned amounts to keep their
/// own floor and ceiling intact. `pressure` is a caller-defined measure of
/// demand (the active count on acquire, the distance from a water mark
/// during rebalancing).
pub trait PoolController: Send + Sync + fmt::Debug {
    /// Number of instances to add
    fn grow(&self, pressure: usize) -> usize;

    /// Number of instances to remove
    fn shrink(&self, pressure: usize) -> usize;
}

/// Controller that returns fixed increments regardless of pressure
///
/// # Examples
///
/// ```
/// use poolkit::{FixedController, PoolController};
///
/// let controller = FixedController::new(4, 2);
/// assert_eq!(controller.grow(100), 4);
/// assert_eq!(controller.shrink(0), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedController {
    grow_increment: usize,
    shrink_increment: usize,
}

impl FixedController {
    pub fn new(grow_increment: usize, shrink_increment: usize) -> Self {
        Self {
            grow_increment,
            shrink_increment,
        }
    }

    /// Same increment for both directions
    pub fn symmetric(increment: usize) -> Self {
        Self::new(increment, increment)
    }
}

impl PoolController for FixedController {
    fn grow(&self, _pressure: usize) -> usize {
        self.grow_increment
    }

    fn shrink(&self, _pressure: usize) -> usize {
        self.shrink_increment
    }
}

/// Default controller for pools without an explicit one: half the span
/// between floor and ceiling, at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfSpanController {
    step: usize,
}

impl HalfSpanController {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            step: (max_size.saturating_sub(min_size) / 2).max(1),
        }
    }
}

impl PoolController for HalfSpanController {
    fn grow(&self, _pressure: usize) -> usize {
        self.step
    }

    fn shrink(&self, _pressure: usize) -> usize {
        self.step
    }
}
