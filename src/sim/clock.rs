//! Round stopwatch
//!
//! Timestamps come from the host (milliseconds, e.g. `performance.now()`),
//! which keeps the clock deterministic under test.

use crate::round_hundredths;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stopwatch {
    started_at: Option<f64>,
    stopped_at: Option<f64>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) timing from `now_ms`
    pub fn start(&mut self, now_ms: f64) {
        self.started_at = Some(now_ms);
        self.stopped_at = None;
    }

    /// Freeze the elapsed time at `now_ms`. No effect if not running.
    pub fn stop(&mut self, now_ms: f64) {
        if self.is_running() {
            self.stopped_at = Some(now_ms);
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    /// Elapsed milliseconds (frozen once stopped, 0 before start)
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => (stop - start).max(0.0),
            (Some(start), None) => (now_ms - start).max(0.0),
            _ => 0.0,
        }
    }

    pub fn elapsed_secs(&self, now_ms: f64) -> f64 {
        self.elapsed_ms(now_ms) / 1000.0
    }

    /// Elapsed seconds at score precision
    pub fn elapsed_hundredths(&self, now_ms: f64) -> f64 {
        round_hundredths(self.elapsed_secs(now_ms))
    }
}
