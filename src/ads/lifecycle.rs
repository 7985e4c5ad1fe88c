//! Protected ad display lifecycle: create, status, close, click.
//!
//! A display moves `Displayed -> Clicked -> Closed` or straight to `Closed`;
//! `Closed` is terminal and nothing mutates a closed record. Close and click
//! require the caller's session id OR IP address to match the record: session
//! ids and IPs can each legitimately change on their own (NAT, session
//! renewal), so requiring both would lock out real viewers.

use super::errors::{AdError, AdResult, OpFailure};
use super::models::{
    AdAnalytics, AdDisplay, AdUnit, DisplayCountdown, DisplayId, DisplayStatus,
    DisplayStatusReport, PlacementStats,
};
use super::store::{ConfigStore, DisplayStore};
use crate::audit::{AuditSink, Severity};
use crate::fraud::{FraudDetector, PlayerId, action};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Clicks landing sooner than this after display are treated as a bot signal.
const SUSPICIOUS_CLICK_SECS: i64 = 2;

/// Governs a single ad impression from creation through protected viewing,
/// click, and close.
pub struct AdDisplayLifecycle {
    config_store: Arc<dyn ConfigStore>,
    display_store: Arc<dyn DisplayStore>,
    fraud: Arc<FraudDetector>,
    audit: Arc<dyn AuditSink>,
}

impl AdDisplayLifecycle {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        display_store: Arc<dyn DisplayStore>,
        fraud: Arc<FraudDetector>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config_store,
            display_store,
            fraud,
            audit,
        }
    }

    /// Create and persist a protected display record.
    ///
    /// Reads `ad_protection_seconds` from the active configuration (falling
    /// back to the default when no configuration exists) and, for logged-in
    /// players, reports a `view_ad` action to the fraud engine.
    pub async fn create(
        &self,
        ad_unit: &AdUnit,
        session_id: &str,
        ip_address: &str,
        user_agent: &str,
        player_id: Option<PlayerId>,
    ) -> AdResult<AdDisplay> {
        self.create_at(ad_unit, session_id, ip_address, user_agent, player_id, Utc::now())
            .await
    }

    /// [`Self::create`] with an explicit "now".
    pub async fn create_at(
        &self,
        ad_unit: &AdUnit,
        session_id: &str,
        ip_address: &str,
        user_agent: &str,
        player_id: Option<PlayerId>,
        now: DateTime<Utc>,
    ) -> AdResult<AdDisplay> {
        let result: Result<AdDisplay, OpFailure> = async {
            let protection_seconds = match self.config_store.active_config().await? {
                Some(config) => config.settings().ad_protection_seconds,
                None => super::models::AdSettings::default().ad_protection_seconds,
            };

            let display = AdDisplay {
                id: Uuid::new_v4(),
                ad_unit_id: ad_unit.id,
                placement: ad_unit.placement,
                player_id,
                session_id: session_id.to_string(),
                ip_address: ip_address.to_string(),
                user_agent: user_agent.to_string(),
                displayed_at: now,
                protection_end_time: now + Duration::seconds(protection_seconds),
                status: DisplayStatus::Displayed,
                click_timestamp: None,
                closed_at: None,
                was_clicked: false,
            };
            self.display_store.insert(&display).await?;

            if let Some(player_id) = player_id {
                self.fraud
                    .record_action_at(
                        player_id,
                        action::VIEW_AD,
                        json!({
                            "ad_unit_id": ad_unit.id,
                            "placement": ad_unit.placement.to_string(),
                            "display_id": display.id,
                            "protection_seconds": protection_seconds,
                        }),
                        now,
                    )
                    .await;
            }

            self.audit.log_event(
                "ad_display_created",
                &format!("unit {} at {}", ad_unit.id, ad_unit.placement),
                Severity::Info,
                Some(ip_address),
            );

            Ok(display)
        }
        .await;

        result.map_err(|failure| {
            failure.into_ad_error(self.audit.as_ref(), "ad_display_creation_error", Some(ip_address))
        })
    }

    /// Current status of a display.
    pub async fn status(&self, display_id: DisplayId) -> AdResult<DisplayStatusReport> {
        self.status_at(display_id, Utc::now()).await
    }

    /// [`Self::status`] with an explicit "now".
    pub async fn status_at(
        &self,
        display_id: DisplayId,
        now: DateTime<Utc>,
    ) -> AdResult<DisplayStatusReport> {
        let display = self.fetch(display_id, "ad_status_error").await?;

        Ok(DisplayStatusReport {
            status: display.status,
            can_close: display.can_be_closed(now),
            seconds_remaining: display.protection_remaining(now),
            protection_end_time: display.protection_end_time,
        })
    }

    /// Countdown information for the protection overlay.
    pub async fn countdown(&self, display_id: DisplayId) -> AdResult<DisplayCountdown> {
        self.countdown_at(display_id, Utc::now()).await
    }

    /// [`Self::countdown`] with an explicit "now".
    pub async fn countdown_at(
        &self,
        display_id: DisplayId,
        now: DateTime<Utc>,
    ) -> AdResult<DisplayCountdown> {
        let display = self.fetch(display_id, "ad_countdown_error").await?;

        let elapsed = display.elapsed_seconds(now);
        let total = display.protection_total_seconds();
        let progress = if total > 0 {
            (elapsed as f64 / total as f64 * 100.0).min(100.0)
        } else {
            100.0
        };

        Ok(DisplayCountdown {
            display_id,
            status: display.status,
            can_close: display.can_be_closed(now),
            seconds_remaining: display.protection_remaining(now),
            elapsed_seconds: elapsed,
            total_protection_seconds: total,
            progress_percentage: progress,
        })
    }

    /// Close a display once its protection window has elapsed.
    pub async fn close(
        &self,
        display_id: DisplayId,
        session_id: &str,
        ip_address: &str,
    ) -> AdResult<AdDisplay> {
        self.close_at(display_id, session_id, ip_address, Utc::now())
            .await
    }

    /// [`Self::close`] with an explicit "now".
    pub async fn close_at(
        &self,
        display_id: DisplayId,
        session_id: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AdResult<AdDisplay> {
        let result: Result<AdDisplay, OpFailure> = async {
            let mut display = self
                .display_store
                .get(display_id)
                .await?
                .ok_or(AdError::NotFound(display_id))?;

            self.verify_ownership(&display, session_id, ip_address, "ad_close_security_violation")?;

            if display.status == DisplayStatus::Closed {
                return Err(AdError::NotDisplayed.into());
            }
            if !display.can_be_closed(now) {
                return Err(AdError::ProtectionActive {
                    can_close_at: display.protection_end_time,
                    seconds_remaining: display.protection_remaining(now),
                }
                .into());
            }

            display.status = DisplayStatus::Closed;
            display.closed_at = Some(now);
            self.display_store.update(&display).await?;

            if let Some(player_id) = display.player_id {
                let duration_seconds = (now - display.displayed_at).num_seconds();
                self.fraud
                    .record_action_at(
                        player_id,
                        action::CLOSE_AD,
                        json!({
                            "display_id": display.id,
                            "duration_seconds": duration_seconds,
                            "closed_after_protection": true,
                        }),
                        now,
                    )
                    .await;
            }

            self.audit.log_event(
                "ad_closed_safely",
                &format!("display {} closed", display.id),
                Severity::Info,
                Some(ip_address),
            );

            Ok(display)
        }
        .await;

        result.map_err(|failure| {
            failure.into_ad_error(self.audit.as_ref(), "ad_close_error", Some(ip_address))
        })
    }

    /// Register a click on a display. A display can be clicked at most once,
    /// and only while still in the `Displayed` state.
    pub async fn click(
        &self,
        display_id: DisplayId,
        session_id: &str,
        ip_address: &str,
    ) -> AdResult<AdDisplay> {
        self.click_at(display_id, session_id, ip_address, Utc::now())
            .await
    }

    /// [`Self::click`] with an explicit "now".
    pub async fn click_at(
        &self,
        display_id: DisplayId,
        session_id: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AdResult<AdDisplay> {
        let result: Result<AdDisplay, OpFailure> = async {
            let mut display = self
                .display_store
                .get(display_id)
                .await?
                .ok_or(AdError::NotFound(display_id))?;

            self.verify_ownership(&display, session_id, ip_address, "ad_click_security_violation")?;

            if display.status != DisplayStatus::Displayed {
                return Err(AdError::NotDisplayed.into());
            }

            display.status = DisplayStatus::Clicked;
            display.was_clicked = true;
            display.click_timestamp = Some(now);
            self.display_store.update(&display).await?;

            if let Some(player_id) = display.player_id {
                let time_to_click = (now - display.displayed_at).num_seconds();
                if time_to_click < SUSPICIOUS_CLICK_SECS {
                    self.fraud
                        .record_action_at(
                            player_id,
                            action::SUSPICIOUS_AD_CLICK,
                            json!({
                                "display_id": display.id,
                                "time_to_click_seconds": time_to_click,
                                "reason": "click too fast",
                            }),
                            now,
                        )
                        .await;
                } else {
                    self.fraud
                        .record_action_at(
                            player_id,
                            action::CLICK_AD,
                            json!({
                                "display_id": display.id,
                                "time_to_click_seconds": time_to_click,
                            }),
                            now,
                        )
                        .await;
                }
            }

            self.audit.log_event(
                "ad_clicked_safely",
                &format!("display {} clicked", display.id),
                Severity::Info,
                Some(ip_address),
            );

            Ok(display)
        }
        .await;

        result.map_err(|failure| {
            failure.into_ad_error(self.audit.as_ref(), "ad_click_error", Some(ip_address))
        })
    }

    /// Ad performance over `[start, end)`.
    pub async fn analytics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AdResult<AdAnalytics> {
        let result: Result<AdAnalytics, OpFailure> = async {
            let displays = self.display_store.list_between(start, end).await?;

            let total_displays = displays.len() as u64;
            let total_clicks = displays.iter().filter(|d| d.was_clicked).count() as u64;
            let total_closed = displays
                .iter()
                .filter(|d| d.status == DisplayStatus::Closed)
                .count() as u64;

            let mut by_placement: HashMap<_, PlacementStats> = HashMap::new();
            for display in &displays {
                let stats = by_placement.entry(display.placement).or_default();
                stats.displays += 1;
                if display.was_clicked {
                    stats.clicks += 1;
                }
                if display.status == DisplayStatus::Closed {
                    stats.closed += 1;
                }
            }
            for stats in by_placement.values_mut() {
                stats.finalize();
            }

            let (ctr, close_rate) = if total_displays > 0 {
                (
                    total_clicks as f64 / total_displays as f64 * 100.0,
                    total_closed as f64 / total_displays as f64 * 100.0,
                )
            } else {
                (0.0, 0.0)
            };

            Ok(AdAnalytics {
                period_start: start,
                period_end: end,
                total_displays,
                total_clicks,
                total_closed,
                ctr,
                close_rate,
                by_placement,
            })
        }
        .await;

        result.map_err(|failure| {
            failure.into_ad_error(self.audit.as_ref(), "ad_analytics_error", None)
        })
    }

    async fn fetch(&self, display_id: DisplayId, operation: &str) -> AdResult<AdDisplay> {
        let result: Result<AdDisplay, OpFailure> = async {
            self.display_store
                .get(display_id)
                .await?
                .ok_or_else(|| AdError::NotFound(display_id).into())
        }
        .await;

        result.map_err(|failure| failure.into_ad_error(self.audit.as_ref(), operation, None))
    }

    /// At least one of session id or IP must match the record.
    fn verify_ownership(
        &self,
        display: &AdDisplay,
        session_id: &str,
        ip_address: &str,
        event_type: &str,
    ) -> Result<(), OpFailure> {
        if display.session_id != session_id && display.ip_address != ip_address {
            self.audit.log_event(
                event_type,
                &format!("display {} accessed from a different session and IP", display.id),
                Severity::Warning,
                Some(ip_address),
            );
            return Err(AdError::SecurityViolation(display.id).into());
        }
        Ok(())
    }
}
