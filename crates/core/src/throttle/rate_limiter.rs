//! Sliding-window rate limiter for external collaborators.
//!
//! Each limiter instance owns one window. Acquisition is non-blocking: a
//! denied caller gets the time until the oldest call leaves the window and
//! decides for itself whether to wait or fail.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Maximum admitted calls per window.
    #[serde(default = "default_max_calls")]
    pub max_calls_per_window: u32,
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_calls() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_calls_per_window: default_max_calls(),
        }
    }
}

/// Rate limit status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub max_calls_per_window: u32,
    pub window_ms: u64,
    pub calls_in_window: u32,
    pub next_available_in_ms: Option<u64>,
}

/// Sliding window of admitted call timestamps.
///
/// Stale timestamps are purged lazily on every admission check.
#[derive(Debug)]
pub struct SlidingWindow {
    window: Duration,
    max_calls: u32,
    calls: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(window: Duration, max_calls: u32) -> Self {
        Self {
            window,
            max_calls,
            calls: VecDeque::with_capacity(max_calls as usize),
        }
    }

    /// Try to admit a call at `now`.
    ///
    /// Returns `Err(wait)` with the time until a slot frees up when the
    /// window is full.
    pub fn try_acquire_at(&mut self, now: Instant) -> Result<(), Duration> {
        self.purge(now);

        if (self.calls.len() as u32) < self.max_calls {
            self.calls.push_back(now);
            Ok(())
        } else {
            Err(self.wait_time(now))
        }
    }

    /// Try to admit a call now.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    /// Drop all recorded calls.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn status(&mut self) -> RateLimitStatus {
        let now = Instant::now();
        self.purge(now);
        let full = self.calls.len() as u32 >= self.max_calls;
        RateLimitStatus {
            max_calls_per_window: self.max_calls,
            window_ms: self.window.as_millis() as u64,
            calls_in_window: self.calls.len() as u32,
            next_available_in_ms: full.then(|| self.wait_time(now).as_millis() as u64),
        }
    }

    fn purge(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn wait_time(&self, now: Instant) -> Duration {
        match self.calls.front() {
            Some(&oldest) => self.window.saturating_sub(now.duration_since(oldest)),
            // A zero-capacity window never frees up; report a full window.
            None => self.window,
        }
    }
}

/// Thread-safe, async-compatible rate limiter.
///
/// Every acquisition runs under the one mutex of this instance, so
/// concurrent callers never push the window past its cap.
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<SlidingWindow>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(SlidingWindow::new(
                Duration::from_millis(config.window_ms),
                config.max_calls_per_window,
            )),
        }
    }

    /// Admit a call if the window has room.
    pub async fn try_acquire(&self) -> bool {
        self.acquire_or_wait_hint().await.is_ok()
    }

    /// Admit a call, or return how long until one would be admitted.
    pub async fn acquire_or_wait_hint(&self) -> Result<(), Duration> {
        let mut window = self.window.lock().await;
        window.try_acquire()
    }

    pub async fn status(&self) -> RateLimitStatus {
        self.window.lock().await.status()
    }

    /// Forget all admitted calls.
    pub async fn reset(&self) {
        self.window.lock().await.clear();
    }
}
