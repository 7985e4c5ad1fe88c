//! Ad domain models: placements, units, configuration, and display records.

use crate::fraud::PlayerId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ad display record ID type
pub type DisplayId = Uuid;

/// Ad unit / configuration row ID type
pub type UnitId = i64;

/// Named slot in the game UI where an ad may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Login screen slot
    Login,
    /// Mining screen slot
    Mining,
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::Login => write!(f, "login"),
            Placement::Mining => write!(f, "mining"),
        }
    }
}

impl std::str::FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Placement::Login),
            "mining" => Ok(Placement::Mining),
            other => Err(format!("unknown placement: {other}")),
        }
    }
}

/// A configured ad slot, owned by the ad configuration panel. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdUnit {
    pub id: UnitId,
    pub config_id: i64,
    /// Network-side unit code (e.g. the slot id issued by the ad network)
    pub unit_id: String,
    pub unit_name: String,
    pub ad_type: String,
    pub placement: Placement,
    pub is_active: bool,
}

/// Active ad-network configuration, with its settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdNetworkConfig {
    pub id: i64,
    pub publisher_id: String,
    pub is_active: bool,
    /// Raw settings document; parse with [`AdNetworkConfig::settings`].
    pub ad_settings: serde_json::Value,
}

impl AdNetworkConfig {
    /// Parse the settings document, falling back to defaults for missing or
    /// malformed fields.
    pub fn settings(&self) -> AdSettings {
        AdSettings::from_value(&self.ad_settings)
    }
}

/// Parsed ad settings. Every field has a default so a partial or empty
/// settings document still yields a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSettings {
    #[serde(default = "default_enabled")]
    pub login_ads_enabled: bool,

    #[serde(default = "default_enabled")]
    pub mining_ads_enabled: bool,

    /// Minimum minutes between displays of the same unit to the same actor
    #[serde(default = "default_interval_minutes")]
    pub ad_interval_minutes: i64,

    /// Minimum seconds an ad must stay on screen before it can be closed
    #[serde(default = "default_protection_seconds")]
    pub ad_protection_seconds: i64,

    /// Risk score above which a player is held from seeing ads
    #[serde(default = "default_fraud_threshold")]
    pub fraud_detection_threshold: u8,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_minutes() -> i64 {
    10
}

fn default_protection_seconds() -> i64 {
    30
}

fn default_fraud_threshold() -> u8 {
    80
}

impl Default for AdSettings {
    fn default() -> Self {
        Self {
            login_ads_enabled: default_enabled(),
            mining_ads_enabled: default_enabled(),
            ad_interval_minutes: default_interval_minutes(),
            ad_protection_seconds: default_protection_seconds(),
            fraud_detection_threshold: default_fraud_threshold(),
        }
    }
}

impl AdSettings {
    /// Parse settings from a raw document. A document that fails to parse as
    /// a whole yields the defaults; individual missing fields default per
    /// field.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Whether ads are enabled for the given placement.
    pub fn placement_enabled(&self, placement: Placement) -> bool {
        match placement {
            Placement::Login => self.login_ads_enabled,
            Placement::Mining => self.mining_ads_enabled,
        }
    }
}

/// Lifecycle state of an ad display.
///
/// Transitions are monotonic: `Displayed -> Clicked -> Closed` or
/// `Displayed -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Displayed,
    Clicked,
    Closed,
}

impl std::fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayStatus::Displayed => write!(f, "displayed"),
            DisplayStatus::Clicked => write!(f, "clicked"),
            DisplayStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for DisplayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "displayed" => Ok(DisplayStatus::Displayed),
            "clicked" => Ok(DisplayStatus::Clicked),
            "closed" => Ok(DisplayStatus::Closed),
            other => Err(format!("unknown display status: {other}")),
        }
    }
}

/// One ad impression, from creation through protected viewing to close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdDisplay {
    pub id: DisplayId,
    pub ad_unit_id: UnitId,
    pub placement: Placement,
    pub player_id: Option<PlayerId>,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub displayed_at: DateTime<Utc>,
    pub protection_end_time: DateTime<Utc>,
    pub status: DisplayStatus,
    pub click_timestamp: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub was_clicked: bool,
}

impl AdDisplay {
    /// Whether the protection window has elapsed at `now`.
    pub fn can_be_closed(&self, now: DateTime<Utc>) -> bool {
        now >= self.protection_end_time
    }

    /// Seconds until the protection window elapses; 0 once closable.
    pub fn protection_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.can_be_closed(now) {
            0
        } else {
            (self.protection_end_time - now).num_seconds().max(0)
        }
    }

    /// Seconds the display has been on screen at `now`.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.displayed_at).num_seconds().max(0)
    }

    /// Total length of the protection window in seconds.
    pub fn protection_total_seconds(&self) -> i64 {
        (self.protection_end_time - self.displayed_at)
            .num_seconds()
            .max(0)
    }
}

/// Actor key used to look up prior displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOwner {
    Session(String),
    Ip(String),
    Player(PlayerId),
}

/// Successful eligibility result: everything the caller needs to create the
/// display.
#[derive(Debug, Clone)]
pub struct AdGrant {
    pub ad_unit: AdUnit,
    pub config: AdNetworkConfig,
    pub settings: AdSettings,
}

/// Current status of a display, as reported to the client.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayStatusReport {
    pub status: DisplayStatus,
    pub can_close: bool,
    pub seconds_remaining: i64,
    pub protection_end_time: DateTime<Utc>,
}

/// Countdown information for the protection overlay.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayCountdown {
    pub display_id: DisplayId,
    pub status: DisplayStatus,
    pub can_close: bool,
    pub seconds_remaining: i64,
    pub elapsed_seconds: i64,
    pub total_protection_seconds: i64,
    /// 0-100, saturating at 100 once the window has elapsed
    pub progress_percentage: f64,
}

/// Aggregate display metrics for a placement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlacementStats {
    pub displays: u64,
    pub clicks: u64,
    pub closed: u64,
    pub ctr: f64,
    pub close_rate: f64,
}

impl PlacementStats {
    pub(crate) fn finalize(&mut self) {
        if self.displays > 0 {
            self.ctr = self.clicks as f64 / self.displays as f64 * 100.0;
            self.close_rate = self.closed as f64 / self.displays as f64 * 100.0;
        }
    }
}

/// Ad performance over a reporting period.
#[derive(Debug, Clone, Serialize)]
pub struct AdAnalytics {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_displays: u64,
    pub total_clicks: u64,
    pub total_closed: u64,
    pub ctr: f64,
    pub close_rate: f64,
    pub by_placement: std::collections::HashMap<Placement, PlacementStats>,
}

/// Interval-check window as a `chrono` duration.
pub(crate) fn interval_duration(settings: &AdSettings) -> Duration {
    Duration::minutes(settings.ad_interval_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placement_roundtrip() {
        assert_eq!(Placement::Login.to_string(), "login");
        assert_eq!(Placement::Mining.to_string(), "mining");
        assert_eq!("login".parse::<Placement>().unwrap(), Placement::Login);
        assert_eq!("mining".parse::<Placement>().unwrap(), Placement::Mining);
        assert!("banner".parse::<Placement>().is_err());
    }

    #[test]
    fn test_display_status_serialization() {
        assert_eq!(
            serde_json::to_string(&DisplayStatus::Displayed).unwrap(),
            "\"displayed\""
        );
        let parsed: DisplayStatus = serde_json::from_str("\"clicked\"").unwrap();
        assert_eq!(parsed, DisplayStatus::Clicked);
    }

    #[test]
    fn test_settings_defaults_on_empty_document() {
        let settings = AdSettings::from_value(&json!({}));
        assert!(settings.login_ads_enabled);
        assert!(settings.mining_ads_enabled);
        assert_eq!(settings.ad_interval_minutes, 10);
        assert_eq!(settings.ad_protection_seconds, 30);
        assert_eq!(settings.fraud_detection_threshold, 80);
    }

    #[test]
    fn test_settings_partial_document() {
        let settings = AdSettings::from_value(&json!({
            "ad_interval_minutes": 3,
            "login_ads_enabled": false
        }));
        assert!(!settings.login_ads_enabled);
        assert!(settings.mining_ads_enabled);
        assert_eq!(settings.ad_interval_minutes, 3);
        assert_eq!(settings.ad_protection_seconds, 30);
    }

    #[test]
    fn test_settings_malformed_document_falls_back() {
        let settings = AdSettings::from_value(&json!("not an object"));
        assert_eq!(settings.ad_interval_minutes, 10);
    }

    #[test]
    fn test_settings_placement_enabled() {
        let settings = AdSettings {
            login_ads_enabled: false,
            ..AdSettings::default()
        };
        assert!(!settings.placement_enabled(Placement::Login));
        assert!(settings.placement_enabled(Placement::Mining));
    }

    fn sample_display(protection_secs: i64) -> AdDisplay {
        let now = Utc::now();
        AdDisplay {
            id: Uuid::new_v4(),
            ad_unit_id: 1,
            placement: Placement::Mining,
            player_id: None,
            session_id: "sess".to_string(),
            ip_address: "127.0.0.1".to_string(),
            user_agent: String::new(),
            displayed_at: now,
            protection_end_time: now + Duration::seconds(protection_secs),
            status: DisplayStatus::Displayed,
            click_timestamp: None,
            closed_at: None,
            was_clicked: false,
        }
    }

    #[test]
    fn test_display_protection_window() {
        let display = sample_display(30);
        let now = display.displayed_at;

        assert!(!display.can_be_closed(now));
        assert_eq!(display.protection_remaining(now), 30);

        let later = now + Duration::seconds(30);
        assert!(display.can_be_closed(later));
        assert_eq!(display.protection_remaining(later), 0);
        assert_eq!(display.protection_total_seconds(), 30);
    }

    #[test]
    fn test_placement_stats_finalize() {
        let mut stats = PlacementStats {
            displays: 8,
            clicks: 2,
            closed: 4,
            ..PlacementStats::default()
        };
        stats.finalize();
        assert!((stats.ctr - 25.0).abs() < f64::EPSILON);
        assert!((stats.close_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_placement_stats_finalize_no_displays() {
        let mut stats = PlacementStats::default();
        stats.finalize();
        assert_eq!(stats.ctr, 0.0);
        assert_eq!(stats.close_rate, 0.0);
    }
}
