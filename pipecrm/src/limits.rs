//! Request rate limiting for abuse-prone endpoints.
//!
//! [`RateLimiter`] is a fixed-window counter keyed by operation and identity
//! (`login:<email>:<ip>`, `forgot:<ip>`, ...), so each endpoint and caller gets an independent
//! budget. State is process-local and lost on restart. The limiter is owned by
//! [`AppState`](crate::AppState) and shared behind an `Arc`.
//!
//! Expired windows are swept lazily from inside [`RateLimiter::check`], at most once per
//! `cleanup_interval`. There is no background task.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RateLimitsConfig;
use crate::errors::{Error, Result};

/// Budget for one operation: at most `max_requests` calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitRule {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitRule {
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self { window, max_requests }
    }
}

/// Outcome of a single [`RateLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Time until the current window closes. Zero when the call was allowed.
    pub retry_after: Duration,
}

impl RateLimitDecision {
    /// Whole seconds to wait, rounded up, as sent in `Retry-After`.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.retry_after.as_millis() as u64;
        millis.div_ceil(1000)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter backed by a concurrent map.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    cleanup_interval: Duration,
    last_cleanup: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(cleanup_interval: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            cleanup_interval,
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    pub fn from_config(config: &RateLimitsConfig) -> Self {
        Self::new(config.cleanup_interval)
    }

    /// Count one call against `key` and report whether it fits in the budget.
    pub fn check(&self, key: &str, rule: &RateLimitRule) -> RateLimitDecision {
        self.check_at(key, rule, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, key: &str, rule: &RateLimitRule, now: Instant) -> RateLimitDecision {
        self.maybe_sweep(now);

        // The entry guard holds the shard lock, so concurrent callers on the same key serialize here.
        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now,
        });

        if window.reset_at <= now {
            *window = Window {
                count: 1,
                reset_at: now + rule.window,
            };
            return RateLimitDecision {
                allowed: true,
                remaining: rule.max_requests.saturating_sub(1),
                retry_after: Duration::ZERO,
            };
        }

        window.count = window.count.saturating_add(1);

        if window.count > rule.max_requests {
            trace!(count = window.count, "rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after: window.reset_at.saturating_duration_since(now),
            };
        }

        RateLimitDecision {
            allowed: true,
            remaining: rule.max_requests - window.count,
            retry_after: Duration::ZERO,
        }
    }

    /// Like [`check`](Self::check), but turns a denial into [`Error::TooManyRequests`].
    pub fn enforce(&self, key: &str, rule: &RateLimitRule) -> Result<RateLimitDecision> {
        let decision = self.check(key, rule);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(Error::TooManyRequests {
                retry_after_secs: decision.retry_after_secs(),
            })
        }
    }

    /// Number of tracked keys, expired or not.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn maybe_sweep(&self, now: Instant) {
        {
            let Ok(mut last) = self.last_cleanup.lock() else {
                return;
            };
            if now.saturating_duration_since(*last) < self.cleanup_interval {
                return;
            }
            *last = now;
        }

        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at > now);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "swept expired rate limit windows");
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
