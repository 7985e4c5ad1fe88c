//! # Arcade Guard
//!
//! The anti-abuse core of the arcade backend. This library decides whether an
//! ad may be shown, paces ad exposure per actor, scores player behavior for
//! automation and fraud, and throttles malicious request traffic.
//!
//! ## Engines
//!
//! - **Ad eligibility** ([`ads::AdEligibilityEngine`]): interval gating per
//!   session/IP/player, volume limits, and fraud-score holds before an ad is
//!   granted.
//! - **Ad display lifecycle** ([`ads::AdDisplayLifecycle`]): a protected
//!   display record from creation through click and close, with a minimum
//!   on-screen protection window.
//! - **Fraud detection** ([`fraud::FraudDetector`]): bounded per-player action
//!   history, pattern detection on every recorded action, an append-only
//!   alert log, and a 0-100 risk score.
//! - **Request throttling** ([`security::RequestThrottle`] and
//!   [`security::LoginAttemptGuard`]): per-IP sliding windows with temporary
//!   blocking and progressive login lockout.
//!
//! Persistence and configuration reach the core through the traits in
//! [`ads::store`]; security events flow out through [`audit::AuditSink`].
//! Every public operation returns a structured result — engine internals
//! never let a storage fault propagate to the caller uncaught.
//!
//! ## Example
//!
//! ```no_run
//! use arcade_guard::ads::{AdDisplayLifecycle, AdEligibilityEngine, Placement, store::MemoryAdStore};
//! use arcade_guard::audit::LogAuditSink;
//! use arcade_guard::fraud::FraudDetector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryAdStore::new());
//!     let audit = Arc::new(LogAuditSink);
//!     let fraud = Arc::new(FraudDetector::new(audit.clone()));
//!
//!     let eligibility = AdEligibilityEngine::new(
//!         store.clone(),
//!         store.clone(),
//!         fraud.clone(),
//!         audit.clone(),
//!     );
//!     let lifecycle = AdDisplayLifecycle::new(store.clone(), store, fraud, audit);
//!
//!     if let Ok(grant) = eligibility
//!         .can_show_ad(Placement::Mining, "sess-1", "192.168.1.10", Some(42))
//!         .await
//!     {
//!         let display = lifecycle
//!             .create(&grant.ad_unit, "sess-1", "192.168.1.10", "Mozilla/5.0", Some(42))
//!             .await
//!             .expect("display record");
//!         println!("showing ad unit {} as display {}", grant.ad_unit.unit_id, display.id);
//!     }
//! }
//! ```

/// Ad pacing: eligibility checks, the protected display lifecycle, and the
/// persistence seam for configuration and display records.
pub mod ads;

/// Security/audit event sink.
pub mod audit;

/// Behavioral fraud scoring and the fraud alert log.
pub mod fraud;

/// Request throttling, login lockout, and input hygiene.
pub mod security;

/// Shared sliding-window arithmetic.
pub mod window;

pub use ads::{
    AdDisplay, AdDisplayLifecycle, AdEligibilityEngine, AdError, AdGrant, AdResult, AdSettings,
    AdUnit, DisplayStatus, Placement,
};
pub use audit::{AuditSink, LogAuditSink, Severity};
pub use fraud::{ActionAnalysis, FraudAlert, FraudDetector, PlayerId};
pub use security::{LoginAttemptGuard, LoginDecision, RequestThrottle, ThrottleDecision};
