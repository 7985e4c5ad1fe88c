//! Request throttling, login lockout, and input hygiene.
//!
//! This module protects endpoints from abusive traffic:
//! - **Request throttle**: 10 requests per minute per IP by default; a breach
//!   blocks the IP for 5 minutes
//! - **Login guard**: 5 failed attempts within 15 minutes blocks the IP for
//!   30 minutes; a success resets the count
//! - **Validation**: email/username/password format checks, input
//!   sanitization, a static IP blacklist, and IP normalization
//!
//! Both limiters key state by normalized IP and perform their check and
//! record under a single write lock, so concurrent requests cannot race past
//! a limit.
//!
//! ## Example
//!
//! ```
//! use arcade_guard::security::{LoginAttemptGuard, RequestThrottle};
//!
//! #[tokio::main]
//! async fn main() {
//!     let throttle = RequestThrottle::default();
//!     let decision = throttle.check_request("203.0.113.7").await;
//!     if !decision.is_allowed() {
//!         println!("back off for {}s", decision.retry_after_secs().unwrap());
//!     }
//!
//!     let guard = LoginAttemptGuard::default();
//!     let decision = guard.check_attempt("203.0.113.7", false).await;
//!     assert!(decision.is_allowed());
//! }
//! ```

pub mod login_guard;
pub mod throttle;
pub mod validate;

pub use login_guard::{LoginAttemptGuard, LoginDecision, LoginGuardConfig};
pub use throttle::{RequestThrottle, ThrottleConfig, ThrottleDecision};
pub use validate::{
    is_ip_blacklisted, is_valid_email, is_valid_password, is_valid_username, normalize_ip,
    sanitize_input,
};

/// Parse an environment variable with a default fallback.
pub(crate) fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
