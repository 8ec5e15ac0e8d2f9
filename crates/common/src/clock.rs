//! Clock and pacing utilities for the per-source mixer loops.
//!
//! Every mixer owns one monotonic clock anchored at its creation. Frame
//! timestamps handed to output callbacks are microseconds since that epoch.
//! This module provides:
//! - The clock itself
//! - Conversions between frame rates and frame intervals
//! - A deadline tracker used by the scheduling loop

use std::time::{Duration, Instant};

/// Clock-rate of video timestamps (microseconds).
pub const VIDEO_TIMEBASE: u64 = 1_000_000;

/// A monotonic clock that provides microsecond timestamps relative to
/// a fixed epoch (the moment the mixer was created).
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    /// The instant the clock was started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl MonotonicClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Microseconds elapsed since the epoch.
    pub fn now_usec(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Wall-clock time at the epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Block the calling thread for `quantum`.
    pub fn sleep(quantum: Duration) {
        std::thread::sleep(quantum);
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Frame interval in microseconds for a frame rate.
///
/// Returns `None` for a zero frame rate.
pub fn frame_interval_usec(fps: u32) -> Option<u64> {
    if fps == 0 {
        None
    } else {
        Some(VIDEO_TIMEBASE / fps as u64)
    }
}

/// Deadline tracker for a periodic producer.
///
/// Unlike a "last tick" limiter, the deadline advances by exactly one
/// interval per produced frame, so a late tick is followed by catch-up
/// ticks instead of drifting.
#[derive(Debug, Clone, Copy)]
pub struct FrameDeadline {
    next_usec: u64,
}

impl FrameDeadline {
    /// Start with the first deadline at `now_usec`.
    pub fn starting_at(now_usec: u64) -> Self {
        Self {
            next_usec: now_usec,
        }
    }

    /// Whether the deadline has been reached.
    pub fn is_due(&self, now_usec: u64) -> bool {
        self.next_usec <= now_usec
    }

    /// Current deadline timestamp.
    pub fn timestamp(&self) -> u64 {
        self.next_usec
    }

    /// Move the deadline forward by one interval.
    pub fn advance(&mut self, interval_usec: u64) {
        self.next_usec = self.next_usec.saturating_add(interval_usec);
    }
}
