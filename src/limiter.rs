//! Per-tenant sliding-window rate limiting.
//!
//! In-memory, suitable for a single-instance deployment. The mutex is held
//! only while the per-key timestamp list is read and updated, never across
//! a provider or store call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default analyze-call budget per tenant.
pub const DEFAULT_MAX_REQUESTS: usize = 10;

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Simple in-memory sliding-window rate limiter.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a request for `key` is allowed right now, recording it
    /// if so. Returns `false` when the key is over budget for the current
    /// window; the caller must retry later, nothing is queued.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        let entry = requests.entry(key.to_string()).or_default();

        entry.retain(|t| now.duration_since(*t) < self.window);
        if entry.len() >= self.max_requests {
            return false;
        }
        entry.push(now);
        true
    }

    /// Remaining requests in the current window for `key`.
    pub fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        let entry = requests.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        self.max_requests.saturating_sub(entry.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, Duration::from_secs(DEFAULT_WINDOW_SECS))
    }
}
