//! Ad pacing and protection.
//!
//! This module implements the ad-side anti-abuse surface:
//! - **Eligibility** ([`AdEligibilityEngine`]): configuration and placement
//!   gates, per-actor interval checks, volume limits, and fraud-score holds
//! - **Lifecycle** ([`AdDisplayLifecycle`]): protected display records with a
//!   minimum on-screen window, at-most-one click, and a terminal closed state
//! - **Persistence seam** ([`store`]): async repository traits with Postgres
//!   and in-memory implementations
//!
//! ## Pacing rules
//!
//! - **Interval**: the same unit is not shown to the same session, IP, or
//!   player more than once per `ad_interval_minutes` (default 10)
//! - **Volume**: at most 20 displays per IP per hour, 50 per session per day,
//!   100 per player per day
//! - **Fraud hold**: players whose risk score exceeds the configured
//!   threshold (default 80) are held without a retry time
//!
//! ## Example
//!
//! ```no_run
//! use arcade_guard::ads::{AdEligibilityEngine, AdError, Placement, store::MemoryAdStore};
//! use arcade_guard::audit::LogAuditSink;
//! use arcade_guard::fraud::FraudDetector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryAdStore::new());
//!     let audit = Arc::new(LogAuditSink);
//!     let fraud = Arc::new(FraudDetector::new(audit.clone()));
//!     let engine = AdEligibilityEngine::new(store.clone(), store, fraud, audit);
//!
//!     match engine.can_show_ad(Placement::Login, "sess-1", "10.0.0.1", None).await {
//!         Ok(grant) => println!("show unit {}", grant.ad_unit.unit_id),
//!         Err(AdError::IntervalNotElapsed { seconds_remaining, .. }) => {
//!             println!("try again in {seconds_remaining}s");
//!         }
//!         Err(reason) => println!("no ad: {reason}"),
//!     }
//! }
//! ```

pub mod eligibility;
pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod store;

pub use eligibility::AdEligibilityEngine;
pub use errors::{AdError, AdResult, IntervalScope, StoreError, StoreResult, VolumeScope};
pub use lifecycle::AdDisplayLifecycle;
pub use models::{
    AdAnalytics, AdDisplay, AdGrant, AdNetworkConfig, AdSettings, AdUnit, DisplayCountdown,
    DisplayId, DisplayOwner, DisplayStatus, DisplayStatusReport, Placement, PlacementStats, UnitId,
};
pub use store::{ConfigStore, DisplayStore, MemoryAdStore, PgAdStore};
