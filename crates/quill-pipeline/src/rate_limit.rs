use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Windows kept in memory before expired entries are swept
const SWEEP_THRESHOLD: usize = 10_000;

/// Rejection with the number of whole seconds until the window resets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

/// Per-principal request throttle.
///
/// The in-memory implementation only counts requests seen by this process;
/// a horizontally scaled deployment needs an implementation backed by a
/// shared counter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `principal_id`, or reject it
    async fn check(&self, principal_id: &str) -> Result<(), RateLimitExceeded>;
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 10,
        }
    }
}

#[derive(Debug)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by principal id
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Same as [`RateLimiter::check`] with an explicit clock
    pub fn check_at(&self, principal_id: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        // A poisoned lock only means another request panicked mid-update; the
        // counters are still usable.
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| w.reset_at > now);
        }

        let window = windows
            .entry(principal_id.to_string())
            .or_insert_with(|| RateWindow {
                count: 0,
                reset_at: now + self.config.window,
            });

        if now > window.reset_at {
            window.count = 0;
            window.reset_at = now + self.config.window;
        }

        if window.count >= self.config.max_requests {
            let remaining = window.reset_at.saturating_duration_since(now);
            let retry_after_secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
            return Err(RateLimitExceeded { retry_after_secs });
        }

        window.count += 1;
        Ok(())
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, principal_id: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(principal_id, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleventh_request_in_window_is_rejected() {
        let limiter = InMemoryRateLimiter::default();
        let start = Instant::now();

        for i in 0..10 {
            let at = start + Duration::from_secs(i);
            assert!(limiter.check_at("alice", at).is_ok(), "request {} rejected", i + 1);
        }

        let err = limiter
            .check_at("alice", start + Duration::from_millis(10_500))
            .unwrap_err();
        // 49.5s left, rounded up
        assert_eq!(err.retry_after_secs, 50);
        assert!(err.retry_after_secs > 0 && err.retry_after_secs <= 60);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig::new(Duration::from_secs(60), 2));
        let start = Instant::now();

        assert!(limiter.check_at("bob", start).is_ok());
        assert!(limiter.check_at("bob", start).is_ok());
        assert!(limiter.check_at("bob", start).is_err());

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at("bob", later).is_ok());
    }

    #[test]
    fn test_principals_are_counted_separately() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        let now = Instant::now();

        assert!(limiter.check_at("alice", now).is_ok());
        assert!(limiter.check_at("alice", now).is_err());
        assert!(limiter.check_at("bob", now).is_ok());
    }

    #[test]
    fn test_retry_after_never_zero_at_window_edge() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        let start = Instant::now();

        assert!(limiter.check_at("carol", start).is_ok());
        let err = limiter
            .check_at("carol", start + Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(err.retry_after_secs, 1);
    }

    #[tokio::test]
    async fn test_trait_check_uses_wall_clock() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        assert!(limiter.check("dave").await.is_ok());
        let err = limiter.check("dave").await.unwrap_err();
        assert!(err.retry_after_secs >= 59 && err.retry_after_secs <= 60);
    }
}
