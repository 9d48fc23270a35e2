//! Per-visitor request rate limiting.
//!
//! A token bucket keyed by remote address: each visitor starts with a full
//! burst, earns `per_sec` tokens per second up to `burst`, and spends one
//! token per limited request. Stale visitor entries are swept by a
//! background task so the map does not grow without bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

struct Visitor {
    tokens: f64,
    last_seen: Instant,
}

/// Mutex-guarded per-address token buckets.
pub struct RateLimiter {
    visitors: Mutex<HashMap<String, Visitor>>,
    per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(per_sec: f64, burst: f64) -> Self {
        Self {
            visitors: Mutex::new(HashMap::new()),
            per_sec,
            burst,
        }
    }

    /// Spend one token for `key`, refilling by elapsed time first.
    /// Returns `false` when the bucket is empty.
    pub fn allow(&self, key: &str) -> bool {
        let mut visitors = self.visitors.lock().expect("limiter mutex poisoned");
        let now = Instant::now();

        let visitor = visitors.entry(key.to_string()).or_insert(Visitor {
            tokens: self.burst,
            last_seen: now,
        });

        let elapsed = now.duration_since(visitor.last_seen);
        visitor.last_seen = now;
        visitor.tokens = (visitor.tokens + elapsed.as_secs_f64() * self.per_sec).min(self.burst);

        if visitor.tokens >= 1.0 {
            visitor.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop visitors idle longer than `ttl`.
    pub fn sweep(&self, ttl: Duration) {
        let mut visitors = self.visitors.lock().expect("limiter mutex poisoned");
        let before = visitors.len();
        visitors.retain(|_, v| v.last_seen.elapsed() <= ttl);
        let dropped = before - visitors.len();
        if dropped > 0 {
            debug!(dropped, remaining = visitors.len(), "swept idle visitors");
        }
    }

    /// Spawn the periodic sweep task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, ttl: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                limiter.sweep(ttl);
            }
        });
    }
}
