//! Behavioral fraud detection over recorded player actions.
//!
//! Every recorded action is analyzed immediately: the append and the pattern
//! scan run inside the same critical section, so two concurrent requests for
//! the same player can never both observe the pre-append history. Detection
//! re-reads only the bounded per-player ring, keeping each call O(history).

use super::errors::{FraudError, FraudResult};
use super::models::{
    ActionAnalysis, FraudAlert, HISTORY_CAPACITY, PlayerActionRecord, PlayerFraudProfile, PlayerId,
    ProfileSummary, action, alert_type,
};
use crate::audit::{AuditSink, Severity};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Suspicion added per triggered detector.
const BOT_CADENCE_WEIGHT: u32 = 10;
const SELF_ELIMINATION_WEIGHT: u32 = 5;
const COIN_GAIN_WEIGHT: u32 = 15;
const RAPID_PURCHASE_WEIGHT: u32 = 8;

/// One-time warning threshold on accumulated suspicion.
const WARNING_THRESHOLD: u32 = 20;
/// Critical-signal threshold; enforcement stays external.
const CRITICAL_THRESHOLD: u32 = 50;

/// Bot cadence: mean inter-arrival ceiling and consistency ceiling over the
/// last five actions.
const CADENCE_MEAN_SECS: f64 = 1.0;
const CADENCE_STDDEV_SECS: f64 = 0.2;

/// Excessive self-elimination: lifetime count floor and share of all actions.
const SELF_ELIMINATION_MIN_COUNT: u64 = 50;
const SELF_ELIMINATION_RATIO: f64 = 0.8;

/// Abnormal coin gain: lifetime count floor, in-history sample floor, and the
/// coins-per-second rate floor.
const COIN_GAIN_MIN_COUNT: u64 = 20;
const COIN_GAIN_MIN_SAMPLES: usize = 10;
const COIN_RATE_PER_SEC: f64 = 1e-10;

/// Rapid purchases: lifetime count floor, in-history sample floor, and the
/// consecutive-pair gap floor over the most recent five purchases.
const PURCHASE_MIN_COUNT: u64 = 5;
const PURCHASE_MIN_SAMPLES: usize = 5;
const PURCHASE_PAIR_GAP_SECS: f64 = 0.5;

/// Fraud scoring engine.
///
/// Maintains a bounded per-player action history, raises alerts on suspicious
/// patterns, and derives a 0-100 risk score.
pub struct FraudDetector {
    profiles: RwLock<HashMap<PlayerId, PlayerFraudProfile>>,
    alerts: RwLock<Vec<FraudAlert>>,
    audit: Arc<dyn AuditSink>,
}

impl FraudDetector {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
            audit,
        }
    }

    /// Record a player action and analyze the updated history.
    ///
    /// # Arguments
    ///
    /// * `player_id` - Player the action belongs to
    /// * `action_type` - Free-form action tag (see [`action`])
    /// * `details` - Action payload; expected keys documented per tag
    pub async fn record_action(
        &self,
        player_id: PlayerId,
        action_type: &str,
        details: Value,
    ) -> ActionAnalysis {
        self.record_action_at(player_id, action_type, details, Utc::now())
            .await
    }

    /// [`Self::record_action`] with an explicit timestamp, for replaying
    /// queued events and for deterministic tests.
    pub async fn record_action_at(
        &self,
        player_id: PlayerId,
        action_type: &str,
        details: Value,
        now: DateTime<Utc>,
    ) -> ActionAnalysis {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(player_id).or_default();

        if profile.history.len() == HISTORY_CAPACITY {
            profile.history.pop_front();
        }
        profile.history.push_back(PlayerActionRecord {
            recorded_at: now,
            action_type: action_type.to_string(),
            details,
        });
        *profile
            .action_counts
            .entry(action_type.to_string())
            .or_insert(0) += 1;
        profile.last_seen.insert(action_type.to_string(), now);

        // Analysis runs under the same lock as the append: the score a
        // concurrent eligibility check reads is never mid-update.
        let mut raised = Vec::new();

        if let Some(details) = detect_bot_cadence(profile) {
            profile.suspicious_activity += BOT_CADENCE_WEIGHT;
            raised.push((alert_type::BOT_ACTIVITY, details));
        }
        if let Some(details) = detect_excessive_self_elimination(profile) {
            profile.suspicious_activity += SELF_ELIMINATION_WEIGHT;
            raised.push((alert_type::EXCESSIVE_SELF_ELIMINATION, details));
        }
        if let Some(details) = detect_abnormal_coin_gain(profile) {
            profile.suspicious_activity += COIN_GAIN_WEIGHT;
            raised.push((alert_type::ABNORMAL_COIN_GAIN, details));
        }
        if let Some(details) = detect_rapid_purchases(profile) {
            profile.suspicious_activity += RAPID_PURCHASE_WEIGHT;
            raised.push((alert_type::RAPID_PURCHASES, details));
        }

        let mut alerts = Vec::with_capacity(raised.len());
        for (tag, details) in raised {
            alerts.push(self.push_alert(player_id, tag, details, now).await);
        }

        let warning_issued =
            if profile.suspicious_activity >= WARNING_THRESHOLD && profile.warnings_issued == 0 {
                profile.warnings_issued += 1;
                log::warn!(
                    "player {} flagged for suspicious activity (score {})",
                    player_id,
                    profile.suspicious_activity
                );
                self.audit.log_event(
                    "fraud_warning_issued",
                    &format!("suspicion score reached {}", profile.suspicious_activity),
                    Severity::Warning,
                    Some(&player_id.to_string()),
                );
                true
            } else {
                false
            };

        let critical = profile.suspicious_activity >= CRITICAL_THRESHOLD;
        if critical {
            self.audit.log_event(
                "fraud_critical",
                &format!(
                    "suspicion score {} exceeds critical threshold",
                    profile.suspicious_activity
                ),
                Severity::Critical,
                Some(&player_id.to_string()),
            );
        }

        ActionAnalysis {
            suspicious: !alerts.is_empty(),
            alerts,
            warning_issued,
            critical,
        }
    }

    /// Risk score in [0, 100] for the player. Unknown players score 0.
    pub async fn risk_score(&self, player_id: PlayerId) -> u8 {
        self.risk_score_at(player_id, Utc::now()).await
    }

    /// [`Self::risk_score`] with an explicit "now".
    pub async fn risk_score_at(&self, player_id: PlayerId, now: DateTime<Utc>) -> u8 {
        let profiles = self.profiles.read().await;
        let Some(profile) = profiles.get(&player_id) else {
            return 0;
        };

        let mut score = i64::from(profile.suspicious_activity.min(100));

        // Account age: long-lived actors are generally more trustworthy.
        if let Some(first) = profile.first_action_at() {
            let age_days = (now - first).num_seconds() as f64 / 86_400.0;
            if age_days > 30.0 {
                score -= 10;
            } else if age_days < 1.0 {
                score += 10;
            }
        }

        // Action diversity: bots repeat the same few actions.
        let distinct = profile.action_counts.len();
        if distinct <= 2 {
            score += 15;
        } else if distinct >= 8 {
            score -= 10;
        }

        score.clamp(0, 100) as u8
    }

    /// Snapshot of a player's aggregate state, if any actions were recorded.
    pub async fn profile_summary(&self, player_id: PlayerId) -> Option<ProfileSummary> {
        let profiles = self.profiles.read().await;
        profiles.get(&player_id).map(|p| ProfileSummary {
            total_actions: p.total_actions(),
            distinct_action_types: p.action_counts.len(),
            suspicious_activity: p.suspicious_activity,
            warnings_issued: p.warnings_issued,
        })
    }

    /// Lifetime count of one action type for a player.
    pub async fn action_count(&self, player_id: PlayerId, action_type: &str) -> u64 {
        let profiles = self.profiles.read().await;
        profiles
            .get(&player_id)
            .map(|p| p.count_of(action_type))
            .unwrap_or(0)
    }

    /// Raise an alert outside of pattern detection (e.g. from an operator
    /// tool).
    pub async fn create_alert(
        &self,
        player_id: PlayerId,
        alert_type: &str,
        details: Value,
    ) -> FraudAlert {
        self.push_alert(player_id, alert_type, details, Utc::now())
            .await
    }

    async fn push_alert(
        &self,
        player_id: PlayerId,
        alert_type: &str,
        details: Value,
        now: DateTime<Utc>,
    ) -> FraudAlert {
        let mut alerts = self.alerts.write().await;
        let alert = FraudAlert {
            // The log is append-only, so the index is a stable id.
            id: alerts.len() as i64,
            created_at: now,
            player_id,
            alert_type: alert_type.to_string(),
            details,
            reviewed: false,
            reviewed_by: None,
            reviewed_at: None,
            action_taken: None,
        };
        alerts.push(alert.clone());

        log::warn!(
            "fraud alert raised: player={}, type={}",
            player_id,
            alert_type
        );

        alert
    }

    /// Alerts for admin review, newest first.
    ///
    /// # Arguments
    ///
    /// * `reviewed` - `Some(true)`/`Some(false)` filter by review state;
    ///   `None` returns all
    /// * `limit` - Maximum number of alerts returned
    pub async fn list_alerts(&self, reviewed: Option<bool>, limit: usize) -> Vec<FraudAlert> {
        let alerts = self.alerts.read().await;
        alerts
            .iter()
            .rev()
            .filter(|a| reviewed.is_none_or(|r| a.reviewed == r))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Mark an alert reviewed. Idempotent: reviewing an already-reviewed
    /// alert refreshes the reviewer fields and is otherwise harmless.
    pub async fn mark_reviewed(
        &self,
        alert_id: i64,
        reviewer_id: i64,
        action_taken: Option<String>,
    ) -> FraudResult<()> {
        let mut alerts = self.alerts.write().await;
        let alert = usize::try_from(alert_id)
            .ok()
            .and_then(|idx| alerts.get_mut(idx))
            .ok_or(FraudError::AlertNotFound(alert_id))?;

        alert.reviewed = true;
        alert.reviewed_by = Some(reviewer_id);
        alert.reviewed_at = Some(Utc::now());
        if action_taken.is_some() {
            alert.action_taken = action_taken;
        }

        Ok(())
    }
}

/// Near-constant cadence over the last five actions reads as automation.
fn detect_bot_cadence(profile: &PlayerFraudProfile) -> Option<Value> {
    if profile.history.len() < 5 {
        return None;
    }

    let recent: Vec<&PlayerActionRecord> =
        profile.history.iter().skip(profile.history.len() - 5).collect();
    let gaps: Vec<f64> = recent
        .windows(2)
        .map(|pair| pair[1].epoch_seconds() - pair[0].epoch_seconds())
        .collect();

    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean >= CADENCE_MEAN_SECS {
        return None;
    }

    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev >= CADENCE_STDDEV_SECS {
        return None;
    }

    Some(json!({
        "avg_time_between_actions": mean,
        "std_dev": std_dev,
        "action_types": recent.iter().map(|a| a.action_type.clone()).collect::<Vec<_>>(),
    }))
}

fn detect_excessive_self_elimination(profile: &PlayerFraudProfile) -> Option<Value> {
    let count = profile.count_of(action::SELF_ELIMINATE);
    if count <= SELF_ELIMINATION_MIN_COUNT {
        return None;
    }

    let total = profile.total_actions();
    if total == 0 {
        return None;
    }
    let ratio = count as f64 / total as f64;
    if ratio <= SELF_ELIMINATION_RATIO {
        return None;
    }

    Some(json!({
        "count": count,
        "percentage": ratio,
    }))
}

fn detect_abnormal_coin_gain(profile: &PlayerFraudProfile) -> Option<Value> {
    if profile.count_of(action::EARN_COINS) <= COIN_GAIN_MIN_COUNT {
        return None;
    }

    let coin_actions: Vec<&PlayerActionRecord> = profile
        .history
        .iter()
        .filter(|a| a.action_type == action::EARN_COINS)
        .collect();
    if coin_actions.len() < COIN_GAIN_MIN_SAMPLES {
        return None;
    }

    let total_coins: f64 = coin_actions
        .iter()
        .map(|a| a.details.get("amount").and_then(Value::as_f64).unwrap_or(0.0))
        .sum();
    let first = coin_actions.first()?;
    let last = coin_actions.last()?;
    let time_span = last.epoch_seconds() - first.epoch_seconds();
    if time_span <= 0.0 {
        return None;
    }

    let coins_per_second = total_coins / time_span;
    if coins_per_second <= COIN_RATE_PER_SEC {
        return None;
    }

    Some(json!({
        "coins_per_second": coins_per_second,
        "total_coins": total_coins,
        "time_span_seconds": time_span,
    }))
}

fn detect_rapid_purchases(profile: &PlayerFraudProfile) -> Option<Value> {
    if profile.count_of(action::BUY_ITEM) <= PURCHASE_MIN_COUNT {
        return None;
    }

    let buys: Vec<&PlayerActionRecord> = profile
        .history
        .iter()
        .filter(|a| a.action_type == action::BUY_ITEM)
        .collect();
    if buys.len() < PURCHASE_MIN_SAMPLES {
        return None;
    }

    let recent = &buys[buys.len() - PURCHASE_MIN_SAMPLES..];
    let rapid_pair = recent
        .windows(2)
        .any(|pair| pair[1].epoch_seconds() - pair[0].epoch_seconds() < PURCHASE_PAIR_GAP_SECS);
    if !rapid_pair {
        return None;
    }

    let purchases: Vec<Value> = recent
        .iter()
        .map(|a| {
            json!([
                a.details.get("item_id").cloned().unwrap_or(Value::Null),
                a.details.get("price").cloned().unwrap_or(Value::Null),
            ])
        })
        .collect();

    Some(json!({ "purchases": purchases }))
}
