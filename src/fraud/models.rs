//! Fraud scoring data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Player ID type
pub type PlayerId = i64;

/// Per-player action history capacity. Oldest entries are evicted first.
pub const HISTORY_CAPACITY: usize = 100;

/// Action type tags recorded by the rest of the backend.
///
/// Tags are free-form strings; these constants cover the actions the engines
/// themselves emit or pattern-match on.
pub mod action {
    pub const VIEW_AD: &str = "view_ad";
    pub const CLICK_AD: &str = "click_ad";
    pub const SUSPICIOUS_AD_CLICK: &str = "suspicious_ad_click";
    pub const CLOSE_AD: &str = "close_ad";
    pub const SELF_ELIMINATE: &str = "self_eliminate";
    /// Expected detail key: `amount` (coin amount, decimal)
    pub const EARN_COINS: &str = "earn_coins";
    /// Expected detail keys: `item_id`, `price`
    pub const BUY_ITEM: &str = "buy_item";
}

/// Alert type tags raised by pattern detection.
pub mod alert_type {
    pub const BOT_ACTIVITY: &str = "bot_activity";
    pub const EXCESSIVE_SELF_ELIMINATION: &str = "excessive_self_elimination";
    pub const ABNORMAL_COIN_GAIN: &str = "abnormal_coin_gain";
    pub const RAPID_PURCHASES: &str = "rapid_purchases";
}

/// One recorded player action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerActionRecord {
    pub recorded_at: DateTime<Utc>,
    pub action_type: String,
    pub details: serde_json::Value,
}

impl PlayerActionRecord {
    /// Timestamp as fractional epoch seconds, for inter-arrival arithmetic.
    pub fn epoch_seconds(&self) -> f64 {
        self.recorded_at.timestamp_millis() as f64 / 1000.0
    }
}

/// Aggregated per-player state, created lazily on the first recorded action.
#[derive(Debug, Default)]
pub struct PlayerFraudProfile {
    /// Chronological ring buffer of recent actions (capacity [`HISTORY_CAPACITY`])
    pub history: VecDeque<PlayerActionRecord>,
    /// Lifetime count per action type
    pub action_counts: HashMap<String, u64>,
    /// Last-seen timestamp per action type
    pub last_seen: HashMap<String, DateTime<Utc>>,
    /// Accumulated suspicion. Grows without bound; clamped to [0, 100] only
    /// when reported as a risk score.
    pub suspicious_activity: u32,
    /// Number of warnings issued (at most one under current policy)
    pub warnings_issued: u32,
}

impl PlayerFraudProfile {
    pub fn count_of(&self, action_type: &str) -> u64 {
        self.action_counts.get(action_type).copied().unwrap_or(0)
    }

    pub fn total_actions(&self) -> u64 {
        self.action_counts.values().sum()
    }

    /// Oldest retained action timestamp. Serves as the account-age anchor;
    /// entries evicted from the ring no longer count.
    pub fn first_action_at(&self) -> Option<DateTime<Utc>> {
        self.history.front().map(|a| a.recorded_at)
    }
}

/// Read-only snapshot of a player's profile for dashboards and tests.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub total_actions: u64,
    pub distinct_action_types: usize,
    pub suspicious_activity: u32,
    pub warnings_issued: u32,
}

/// Immutable fraud alert, reviewed in place by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub player_id: PlayerId,
    pub alert_type: String,
    pub details: serde_json::Value,
    pub reviewed: bool,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub action_taken: Option<String>,
}

/// Outcome of recording one action.
#[derive(Debug, Clone)]
pub struct ActionAnalysis {
    /// Whether any detector triggered on this call
    pub suspicious: bool,
    /// Alerts raised by this call
    pub alerts: Vec<FraudAlert>,
    /// Whether this call issued the player's one-time warning
    pub warning_issued: bool,
    /// Whether accumulated suspicion is at or above the critical threshold.
    /// Enforcement (suspension, manual review) is an external decision.
    pub critical: bool,
}
