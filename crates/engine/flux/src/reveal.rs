//! Progressive reveal of a sorted voxel list
//!
//! The animator only tracks how many of the brightest voxels are visible. It
//! never touches the voxel data itself; renderers draw the first
//! [`RevealAnimator::revealed`] entries each frame.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Fewest cells revealed by a tick that still has work to do
const MIN_STEP: usize = 15;

/// Fraction of the remaining cells revealed per second
const RATE_PER_SECOND: f32 = 3.0;

/// Largest f32 below 1.0
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// Per-frame reveal state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealAnimator {
    revealed: usize,
    count: usize,
    generation: u64,
}

impl RevealAnimator {
    pub fn new(count: usize, generation: u64) -> Self {
        Self {
            revealed: 0,
            count,
            generation,
        }
    }

    /// Adopt a new voxel count and configuration generation
    ///
    /// Any change restarts the reveal from zero. Returns whether it restarted.
    pub fn sync(&mut self, count: usize, generation: u64) -> bool {
        if self.count == count && self.generation == generation {
            return false;
        }
        trace!(count, generation, "reveal restarted");
        *self = Self::new(count, generation);
        true
    }

    /// Advance by `dt` seconds, returning the new revealed count
    ///
    /// The step is `max(15, ceil(remaining * 3 * dt))`, clamped to the total,
    /// so reveals start fast and decelerate.
    pub fn tick(&mut self, dt: f32) -> usize {
        if self.revealed >= self.count {
            return self.revealed;
        }
        let remaining = self.count - self.revealed;
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let proportional = (remaining as f32 * RATE_PER_SECOND * dt).ceil() as usize;
        let step = proportional.max(MIN_STEP).min(remaining);
        self.revealed += step;
        self.revealed
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_complete(&self) -> bool {
        self.revealed >= self.count
    }

    /// Jump straight to the end
    pub fn finish(&mut self) {
        self.revealed = self.count;
    }

    /// Linear progress in [0, 1]; 1 when there is nothing to reveal
    pub fn progress(&self) -> f32 {
        if self.count == 0 {
            return 1.0;
        }
        self.revealed as f32 / self.count as f32
    }

    /// Cubic ease-out of [`progress`](Self::progress)
    ///
    /// Exactly 1.0 only once every cell is revealed.
    pub fn eased_progress(&self) -> f32 {
        if self.is_complete() {
            return 1.0;
        }
        let t = self.progress();
        (1.0 - (1.0 - t).powi(3)).min(BELOW_ONE)
    }

    /// The currently visible prefix of `items`
    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[..self.revealed.min(items.len())]
    }
}
