//! Fixed-window rate limiting per principal.
//!
//! Each key owns a window `{count, reset_time}`. A request after `reset_time`
//! opens a fresh window. Within a window requests are admitted until `count`
//! reaches the maximum. Windows live in a sharded concurrent map so that the
//! read-modify-write for one key is atomic without a global lock.

use crate::decision::AccessDecision;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_seconds: u32,
    /// Whole windows a finished window is kept before eviction.
    pub eviction_grace_windows: u32,
    /// Upper bound on tracked keys. At the bound, a new key first sweeps
    /// stale windows and then evicts the windows closest to their reset.
    pub max_tracked_keys: Option<usize>,
}

impl RateLimitConfig {
    /// Creates a new rate limit configuration.
    #[must_use]
    pub fn new(max_requests: u32, window_seconds: u32) -> Self {
        Self {
            max_requests,
            window_seconds,
            eviction_grace_windows: 1,
            max_tracked_keys: None,
        }
    }

    /// Requests per minute.
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// Sets the eviction grace in windows.
    #[must_use]
    pub fn with_eviction_grace_windows(mut self, windows: u32) -> Self {
        self.eviction_grace_windows = windows;
        self
    }

    /// Caps the number of tracked keys.
    #[must_use]
    pub fn with_max_tracked_keys(mut self, max: usize) -> Self {
        self.max_tracked_keys = Some(max);
        self
    }

    /// Returns the window as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::from(self.window_seconds))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// State for a single rate limit window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    /// Requests admitted in this window.
    count: u32,
    /// End of this window.
    reset_time: DateTime<Utc>,
    /// Length of this window.
    window: Duration,
}

impl WindowState {
    fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            reset_time: now + window,
            window,
        }
    }

    /// Returns true if the window ended more than `grace` windows before `now`.
    fn is_stale(&self, now: DateTime<Utc>, grace: u32) -> bool {
        let grace = i32::try_from(grace).unwrap_or(i32::MAX);
        self.window
            .checked_mul(grace)
            .and_then(|extra| self.reset_time.checked_add_signed(extra))
            .is_some_and(|evict_after| evict_after < now)
    }
}

/// A rate limiter keyed by principal.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<DashMap<String, WindowState>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(DashMap::new()),
        }
    }

    /// Checks and counts a request using the configured defaults.
    pub fn check(&self, key: &str) -> AccessDecision {
        self.check_rate(key, self.config.max_requests, self.config.window())
    }

    /// Checks and counts a request against an explicit limit.
    pub fn check_rate(&self, key: &str, max_requests: u32, window: Duration) -> AccessDecision {
        self.check_rate_at(key, max_requests, window, Utc::now())
    }

    /// Checks and counts a request as of `now`.
    pub fn check_rate_at(
        &self,
        key: &str,
        max_requests: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        if let Some(cap) = self.config.max_tracked_keys {
            if self.state.len() >= cap && !self.state.contains_key(key) {
                self.make_room(cap, now);
            }
        }

        let mut entry = self
            .state
            .entry(key.to_string())
            .or_insert_with(|| WindowState::open(now, window));
        let window_state = entry.value_mut();

        if now > window_state.reset_time {
            *window_state = WindowState::open(now, window);
        }

        if window_state.count >= max_requests {
            debug!(key, reset_time = %window_state.reset_time, "rate limit exceeded");
            return AccessDecision::rate_limited(window_state.reset_time);
        }

        window_state.count += 1;
        AccessDecision::within_rate(max_requests - window_state.count, window_state.reset_time)
    }

    /// Evicts windows that ended more than the grace period before `now`.
    ///
    /// Returns the number of evicted keys.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.state.len();
        let grace = self.config.eviction_grace_windows;
        self.state.retain(|_, window| !window.is_stale(now, grace));
        let evicted = before.saturating_sub(self.state.len());
        if evicted > 0 {
            debug!(evicted, "swept stale rate limit windows");
        }
        evicted
    }

    /// Brings the map below `cap` so one more key fits.
    ///
    /// Stale windows go first. If that is not enough, the windows nearest to
    /// their reset are evicted, plus a tenth of the cap as headroom so the
    /// next new keys do not rescan the map.
    fn make_room(&self, cap: usize, now: DateTime<Utc>) {
        self.sweep(now);
        let len = self.state.len();
        if len < cap {
            return;
        }

        let excess = len - cap + 1 + cap / 10;
        let mut oldest: Vec<(DateTime<Utc>, String)> = self
            .state
            .iter()
            .map(|entry| (entry.value().reset_time, entry.key().clone()))
            .collect();
        oldest.sort_unstable();
        for (_, key) in oldest.into_iter().take(excess) {
            self.state.remove(&key);
        }
        warn!(cap, evicted = excess, "rate limiter at key cap, evicted live windows");
    }

    /// Number of keys with a live window.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.state.len()
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
