//! Progressive lockout for authentication attempts.

use super::parse_env_or;
use super::validate::normalize_ip;
use crate::window;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Login guard configuration
#[derive(Debug, Clone)]
pub struct LoginGuardConfig {
    /// Failed attempts that trigger a block
    pub max_failures: usize,

    /// Window in which failures are counted, in seconds
    pub window_secs: i64,

    /// Block duration in seconds
    pub block_secs: i64,
}

impl Default for LoginGuardConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window_secs: 900,
            block_secs: 1800,
        }
    }
}

impl LoginGuardConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults (5 failures / 15 minutes, 30-minute block).
    pub fn from_env() -> Self {
        Self {
            max_failures: parse_env_or("LOGIN_GUARD_MAX_FAILURES", 5),
            window_secs: parse_env_or("LOGIN_GUARD_WINDOW_SECS", 900),
            block_secs: parse_env_or("LOGIN_GUARD_BLOCK_SECS", 1800),
        }
    }
}

/// Per-IP login attempt state
#[derive(Debug, Default)]
struct LoginAttemptState {
    attempts: VecDeque<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Login attempt check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginDecision {
    /// Attempt may proceed
    Allowed,

    /// IP is locked out; retry after the given number of seconds
    Blocked { retry_after_secs: i64 },
}

impl LoginDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LoginDecision::Allowed)
    }

    pub fn retry_after_secs(&self) -> Option<i64> {
        match self {
            LoginDecision::Blocked { retry_after_secs } => Some(*retry_after_secs),
            LoginDecision::Allowed => None,
        }
    }
}

/// Progressive login lockout, independent of the request throttle.
///
/// A successful attempt clears the failure history for the IP. Reaching the
/// failure limit blocks the IP and clears the history, so the count restarts
/// once the block expires.
pub struct LoginAttemptGuard {
    config: LoginGuardConfig,
    states: RwLock<HashMap<String, LoginAttemptState>>,
}

impl LoginAttemptGuard {
    pub fn new(config: LoginGuardConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Record the outcome of a login attempt and report whether the IP may
    /// continue.
    pub async fn check_attempt(&self, ip_address: &str, success: bool) -> LoginDecision {
        self.check_attempt_at(ip_address, success, Utc::now()).await
    }

    /// [`Self::check_attempt`] with an explicit "now".
    pub async fn check_attempt_at(
        &self,
        ip_address: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> LoginDecision {
        let key = normalize_ip(ip_address);
        let mut states = self.states.write().await;
        let state = states.entry(key).or_default();

        if let Some(blocked_until) = state.blocked_until {
            if now < blocked_until {
                return LoginDecision::Blocked {
                    retry_after_secs: (blocked_until - now).num_seconds(),
                };
            }
            state.blocked_until = None;
        }

        if success {
            state.attempts.clear();
            return LoginDecision::Allowed;
        }

        window::prune_expired(
            &mut state.attempts,
            now,
            Duration::seconds(self.config.window_secs),
        );
        state.attempts.push_back(now);

        if state.attempts.len() >= self.config.max_failures {
            state.blocked_until = Some(now + Duration::seconds(self.config.block_secs));
            state.attempts.clear();
            log::warn!(
                "login lockout for {}: {} failures, blocked for {}s",
                ip_address,
                self.config.max_failures,
                self.config.block_secs
            );
            return LoginDecision::Blocked {
                retry_after_secs: self.config.block_secs,
            };
        }

        LoginDecision::Allowed
    }
}

impl Default for LoginAttemptGuard {
    fn default() -> Self {
        Self::new(LoginGuardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifth_failure_blocks_for_1800s() {
        let guard = LoginAttemptGuard::default();
        let now = Utc::now();

        for i in 0..4 {
            let decision = guard
                .check_attempt_at("10.0.0.1", false, now + Duration::seconds(i))
                .await;
            assert!(decision.is_allowed(), "failure {} should not block", i + 1);
        }

        let decision = guard
            .check_attempt_at("10.0.0.1", false, now + Duration::seconds(4))
            .await;
        assert_eq!(
            decision,
            LoginDecision::Blocked {
                retry_after_secs: 1800
            }
        );
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let guard = LoginAttemptGuard::default();
        let now = Utc::now();

        for i in 0..4 {
            guard
                .check_attempt_at("10.0.0.1", false, now + Duration::seconds(i))
                .await;
        }
        // Success wipes the slate
        assert!(
            guard
                .check_attempt_at("10.0.0.1", true, now + Duration::seconds(5))
                .await
                .is_allowed()
        );

        // Four fresh failures still do not block
        for i in 6..10 {
            let decision = guard
                .check_attempt_at("10.0.0.1", false, now + Duration::seconds(i))
                .await;
            assert!(decision.is_allowed());
        }
    }

    #[tokio::test]
    async fn test_blocked_ip_reports_remaining_seconds() {
        let guard = LoginAttemptGuard::default();
        let now = Utc::now();

        for _ in 0..5 {
            guard.check_attempt_at("10.0.0.1", false, now).await;
        }

        let decision = guard
            .check_attempt_at("10.0.0.1", false, now + Duration::seconds(600))
            .await;
        assert_eq!(
            decision,
            LoginDecision::Blocked {
                retry_after_secs: 1200
            }
        );

        // Even a successful attempt is rejected while blocked
        let decision = guard
            .check_attempt_at("10.0.0.1", true, now + Duration::seconds(600))
            .await;
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_block_expires_and_count_restarts() {
        let guard = LoginAttemptGuard::default();
        let now = Utc::now();

        for _ in 0..5 {
            guard.check_attempt_at("10.0.0.1", false, now).await;
        }

        // After expiry the attempt list restarts from zero
        let after = now + Duration::seconds(1800);
        let decision = guard.check_attempt_at("10.0.0.1", false, after).await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_old_failures_fall_out_of_window() {
        let guard = LoginAttemptGuard::default();
        let now = Utc::now();

        for i in 0..4 {
            guard
                .check_attempt_at("10.0.0.1", false, now + Duration::seconds(i))
                .await;
        }

        // 16 minutes later those failures are stale; the 5th is really a 1st
        let decision = guard
            .check_attempt_at("10.0.0.1", false, now + Duration::minutes(16))
            .await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_ips_are_independent() {
        let guard = LoginAttemptGuard::default();
        let now = Utc::now();

        for _ in 0..5 {
            guard.check_attempt_at("10.0.0.1", false, now).await;
        }

        assert!(guard.check_attempt_at("10.0.0.2", false, now).await.is_allowed());
    }
}
