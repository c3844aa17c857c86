//! Sliding-window admission control per session

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use wayfinder_core::config::RateLimitConfig;
use wayfinder_core::Clock;

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Denied { retry_after_ms: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// At most `max_requests` admissions per key within any `window_ms` span
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<u64>>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
            window_ms: config.window_ms.max(1),
            max_requests: config.max_requests,
        }
    }

    /// Admit and record a request for `key`, or report when to retry
    ///
    /// The prune, count and record steps run under the key's map entry, so
    /// concurrent checks for one session cannot over-admit.
    pub fn check(&self, key: &str) -> Admission {
        let now = self.clock.now_ms();
        let mut window = self.windows.entry(key.to_string()).or_default();
        prune(&mut window, now, self.window_ms);

        if window.len() < self.max_requests {
            window.push_back(now);
            return Admission::Allowed {
                remaining: self.max_requests - window.len(),
            };
        }

        let retry_after_ms = window
            .front()
            .map(|oldest| (oldest + self.window_ms).saturating_sub(now))
            .unwrap_or(self.window_ms);
        debug!(key, retry_after_ms, "Rate limit exceeded");
        Admission::Denied { retry_after_ms }
    }

    /// Drop expired timestamps and empty windows, returning the number of keys removed
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            prune(window, now, self.window_ms);
            !window.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

fn prune(window: &mut VecDeque<u64>, now: u64, window_ms: u64) {
    while window
        .front()
        .is_some_and(|&t| now.saturating_sub(t) >= window_ms)
    {
        window.pop_front();
    }
}
