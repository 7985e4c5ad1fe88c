//! Behavioral fraud scoring.
//!
//! This module implements write-triggers-analysis fraud detection:
//! - **Bounded history**: each player keeps a 100-entry chronological ring of
//!   recent actions
//! - **Pattern detection**: bot cadence, excessive self-elimination, abnormal
//!   coin gain, and rapid purchases are evaluated on every recorded action
//! - **Alerting**: each triggered pattern raises an alert into an append-only
//!   log reviewed by admins
//! - **Risk scoring**: a 0-100 score derived from accumulated suspicion,
//!   account age, and action diversity
//!
//! Detection never blocks on I/O; enforcement (suspension, manual review) is
//! an external decision driven by the returned [`ActionAnalysis`] and the
//! audit sink.
//!
//! ## Example
//!
//! ```
//! use arcade_guard::audit::LogAuditSink;
//! use arcade_guard::fraud::{FraudDetector, action};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let detector = FraudDetector::new(Arc::new(LogAuditSink));
//!
//!     let analysis = detector
//!         .record_action(42, action::EARN_COINS, json!({ "amount": 25.0 }))
//!         .await;
//!     if analysis.critical {
//!         println!("player 42 crossed the critical threshold");
//!     }
//!
//!     let score = detector.risk_score(42).await;
//!     println!("risk score: {score}");
//! }
//! ```

pub mod detector;
pub mod errors;
pub mod models;

pub use detector::FraudDetector;
pub use errors::{FraudError, FraudResult};
pub use models::{
    ActionAnalysis, FraudAlert, HISTORY_CAPACITY, PlayerActionRecord, PlayerFraudProfile, PlayerId,
    ProfileSummary, action, alert_type,
};
