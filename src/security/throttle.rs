//! Per-IP request throttling with temporary blocking.

use super::parse_env_or;
use super::validate::normalize_ip;
use crate::window;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Throttle configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum requests allowed in the window
    pub max_requests: usize,

    /// Sliding window length in seconds
    pub window_secs: i64,

    /// Block duration in seconds once the limit is breached
    pub block_secs: i64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            block_secs: 300,
        }
    }
}

impl ThrottleConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults (10 requests / 60s, 300s block).
    pub fn from_env() -> Self {
        Self {
            max_requests: parse_env_or("THROTTLE_MAX_REQUESTS", 10),
            window_secs: parse_env_or("THROTTLE_WINDOW_SECS", 60),
            block_secs: parse_env_or("THROTTLE_BLOCK_SECS", 300),
        }
    }
}

/// Per-IP request state
#[derive(Debug, Default)]
struct RateLimitState {
    timestamps: VecDeque<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Throttle check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Request is allowed
    Allowed { remaining: usize },

    /// Request is rejected; retry after the given number of seconds
    Blocked { retry_after_secs: i64 },
}

impl ThrottleDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ThrottleDecision::Allowed { .. })
    }

    pub fn retry_after_secs(&self) -> Option<i64> {
        match self {
            ThrottleDecision::Blocked { retry_after_secs } => Some(*retry_after_secs),
            ThrottleDecision::Allowed { .. } => None,
        }
    }
}

/// Per-IP sliding-window rate limiter.
///
/// An IP breaching the window limit is blocked for a fixed period. Block
/// state is cleared lazily on the first check after expiry; there is no
/// background sweep.
pub struct RequestThrottle {
    config: ThrottleConfig,
    states: RwLock<HashMap<String, RateLimitState>>,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether a request from this IP is allowed, recording it if so.
    pub async fn check_request(&self, ip_address: &str) -> ThrottleDecision {
        self.check_request_at(ip_address, Utc::now()).await
    }

    /// [`Self::check_request`] with an explicit "now".
    ///
    /// The check and the record happen under one write lock: two concurrent
    /// requests cannot both slip past the limit.
    pub async fn check_request_at(&self, ip_address: &str, now: DateTime<Utc>) -> ThrottleDecision {
        let key = normalize_ip(ip_address);
        let mut states = self.states.write().await;
        let state = states.entry(key).or_default();

        if let Some(blocked_until) = state.blocked_until {
            if now < blocked_until {
                return ThrottleDecision::Blocked {
                    retry_after_secs: (blocked_until - now).num_seconds(),
                };
            }
            state.blocked_until = None;
        }

        window::prune_expired(
            &mut state.timestamps,
            now,
            Duration::seconds(self.config.window_secs),
        );

        if state.timestamps.len() >= self.config.max_requests {
            state.blocked_until = Some(now + Duration::seconds(self.config.block_secs));
            log::warn!(
                "rate limit exceeded for {}: blocked for {}s",
                ip_address,
                self.config.block_secs
            );
            return ThrottleDecision::Blocked {
                retry_after_secs: self.config.block_secs,
            };
        }

        state.timestamps.push_back(now);
        ThrottleDecision::Allowed {
            remaining: self.config.max_requests - state.timestamps.len(),
        }
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_within_limit() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for i in 0..10 {
            let decision = throttle.check_request_at("10.0.0.1", now).await;
            assert_eq!(
                decision,
                ThrottleDecision::Allowed { remaining: 9 - i },
                "request {} should be allowed",
                i + 1
            );
        }
    }

    #[tokio::test]
    async fn test_eleventh_request_blocked() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for _ in 0..10 {
            throttle.check_request_at("10.0.0.1", now).await;
        }

        let decision = throttle.check_request_at("10.0.0.1", now).await;
        assert_eq!(
            decision,
            ThrottleDecision::Blocked {
                retry_after_secs: 300
            }
        );
    }

    #[tokio::test]
    async fn test_block_persists_even_when_volume_drops() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for _ in 0..11 {
            throttle.check_request_at("10.0.0.1", now).await;
        }

        // 299 seconds later the window itself has long drained, but the
        // block still stands
        let decision = throttle
            .check_request_at("10.0.0.1", now + Duration::seconds(299))
            .await;
        assert_eq!(
            decision,
            ThrottleDecision::Blocked {
                retry_after_secs: 1
            }
        );
    }

    #[tokio::test]
    async fn test_block_clears_lazily_after_expiry() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for _ in 0..11 {
            throttle.check_request_at("10.0.0.1", now).await;
        }

        let decision = throttle
            .check_request_at("10.0.0.1", now + Duration::seconds(300))
            .await;
        assert!(decision.is_allowed(), "block expires after exactly 300s");
    }

    #[tokio::test]
    async fn test_window_slides() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for _ in 0..10 {
            throttle.check_request_at("10.0.0.1", now).await;
        }

        // 61 seconds on, the old requests left the window; no block was set
        let decision = throttle
            .check_request_at("10.0.0.1", now + Duration::seconds(61))
            .await;
        assert_eq!(decision, ThrottleDecision::Allowed { remaining: 9 });
    }

    #[tokio::test]
    async fn test_ips_are_independent() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for _ in 0..11 {
            throttle.check_request_at("10.0.0.1", now).await;
        }

        assert!(throttle.check_request_at("10.0.0.2", now).await.is_allowed());
    }

    #[tokio::test]
    async fn test_ipv4_mapped_ipv6_shares_state() {
        let throttle = RequestThrottle::default();
        let now = Utc::now();

        for _ in 0..10 {
            throttle.check_request_at("10.0.0.1", now).await;
        }

        let decision = throttle
            .check_request_at("::ffff:10.0.0.1", now)
            .await;
        assert!(
            !decision.is_allowed(),
            "IPv4-mapped IPv6 must share the IPv4 budget"
        );
    }

    #[tokio::test]
    async fn test_custom_config() {
        let throttle = RequestThrottle::new(ThrottleConfig {
            max_requests: 2,
            window_secs: 10,
            block_secs: 20,
        });
        let now = Utc::now();

        assert!(throttle.check_request_at("10.0.0.1", now).await.is_allowed());
        assert!(throttle.check_request_at("10.0.0.1", now).await.is_allowed());
        let decision = throttle.check_request_at("10.0.0.1", now).await;
        assert_eq!(decision.retry_after_secs(), Some(20));
    }
}
