//! Monotonic time source, per-level frame delay and the level countdown.

use std::time::{Duration, Instant};

/// Frame delay at level 0.
pub const BASE_FRAME_DELAY: Duration = Duration::from_millis(200);
/// Frame delay shed per level.
pub const LEVEL_STEP: Duration = Duration::from_millis(10);
/// Floor for the frame delay at high levels.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);
/// Time allotted to each level.
pub const NEXT_LEVEL: Duration = Duration::from_secs(240);

/// Source of monotonic instants. Swapped for a manual clock in tests.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Gravity interval for `level`: 10 ms faster per level, never below `MIN_FRAME_DELAY`.
pub fn frame_delay(level: u32) -> Duration {
    LEVEL_STEP
        .checked_mul(level)
        .and_then(|step| BASE_FRAME_DELAY.checked_sub(step))
        .map_or(MIN_FRAME_DELAY, |delay| delay.max(MIN_FRAME_DELAY))
}

/// Countdown until the next level-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTimer {
    deadline: Instant,
}

impl LevelTimer {
    pub fn start(now: Instant) -> Self {
        Self {
            deadline: now + NEXT_LEVEL,
        }
    }

    #[cfg(test)]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn reset(&mut self, now: Instant) {
        self.deadline = now + NEXT_LEVEL;
    }

    /// Push the deadline back, e.g. by the time spent paused.
    pub fn extend(&mut self, by: Duration) {
        self.deadline += by;
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Whole seconds left, rounded down; zero once expired.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.deadline.saturating_duration_since(now).as_secs()
    }
}
