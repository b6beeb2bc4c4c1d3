//! Points-per-second throttle.
//!
//! A sliding one-second window: the limiter remembers when each batch was
//! admitted and refuses a batch that would push the total inside the last
//! second above the limit. The caller passes `now` explicitly, so the
//! limiter never reads a clock or sleeps itself.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Length of the throttling window.
pub const WINDOW: Duration = Duration::from_secs(1);

/// Sliding-window rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Points allowed per window, 0 for unlimited.
    limit: u64,
    /// Admitted batches still inside the window.
    admitted: VecDeque<(Instant, u64)>,
    /// Sum of points in `admitted`.
    in_window: u64,
}

impl RateLimiter {
    /// Creates a limiter allowing `points_per_second`, 0 for unlimited.
    pub fn new(points_per_second: u32) -> Self {
        Self {
            limit: u64::from(points_per_second),
            admitted: VecDeque::new(),
            in_window: 0,
        }
    }

    /// Returns true if the limiter never delays.
    #[cfg(test)]
    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    /// Points admitted within the current window.
    #[cfg(test)]
    pub fn in_window(&self) -> u64 {
        self.in_window
    }

    /// Asks to send `points` at `now`.
    ///
    /// Returns `None` if the points were admitted, or the time to wait
    /// before asking again. A batch larger than the limit is admitted only
    /// into an empty window.
    pub fn acquire(&mut self, points: u64, now: Instant) -> Option<Duration> {
        if self.limit == 0 {
            return None;
        }

        self.expire(now);
        if self.in_window == 0 || self.in_window + points <= self.limit {
            self.admitted.push_back((now, points));
            self.in_window += points;
            return None;
        }

        let mut remaining = self.in_window;
        for (at, admitted) in &self.admitted {
            remaining -= admitted;
            if remaining == 0 || remaining + points <= self.limit {
                return Some((*at + WINDOW).saturating_duration_since(now));
            }
        }
        Some(WINDOW)
    }

    /// Drops batches that left the window.
    fn expire(&mut self, now: Instant) {
        while let Some(&(at, points)) = self.admitted.front() {
            if at + WINDOW > now {
                break;
            }
            self.admitted.pop_front();
            self.in_window -= points;
        }
    }
}
