//! Keyed fixed-window rate limiting.
//!
//! Counters live in the process, keyed by caller (user id), not in any
//! client-held session state.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// `limit` actions per `window` for each key.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of keys with a live or stale window.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Count one action for `key` at `now`.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> RateDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        let w = entry.value_mut();

        if now - w.started >= self.window {
            *w = Window {
                started: now,
                count: 0,
            };
        }

        if w.count >= self.limit {
            let retry_after = (w.started + self.window) - now;
            tracing::debug!(key, retry_after_secs = retry_after.num_seconds(), "rate limited");
            return RateDecision::Limited { retry_after };
        }

        w.count += 1;
        RateDecision::Allowed {
            remaining: self.limit - w.count,
        }
    }

    /// Drop windows that ended before `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.windows.retain(|_, w| now - w.started < self.window);
    }
}
