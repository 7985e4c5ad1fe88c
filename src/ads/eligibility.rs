//! Ad eligibility checks: interval gating, volume limits, and fraud holds.

use super::errors::{AdError, AdResult, IntervalScope, OpFailure, VolumeScope};
use super::models::{
    AdGrant, AdSettings, AdUnit, DisplayOwner, Placement, interval_duration,
};
use super::store::{ConfigStore, DisplayStore};
use crate::audit::AuditSink;
use crate::fraud::{FraudDetector, PlayerId};
use crate::window;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Maximum displays per IP in the trailing hour.
const IP_HOURLY_LIMIT: u64 = 20;
/// Maximum displays per session in the trailing 24 hours.
const SESSION_DAILY_LIMIT: u64 = 50;
/// Maximum displays per player in the trailing 24 hours.
const PLAYER_DAILY_LIMIT: u64 = 100;

/// Decides whether an ad may be shown for a (placement, session, IP, player)
/// tuple.
///
/// Checks short-circuit in a fixed order: configuration, placement flag,
/// unit availability, interval (session before IP before player), then
/// volume limits and the fraud-score hold. The first violation found is the
/// one reported.
pub struct AdEligibilityEngine {
    config_store: Arc<dyn ConfigStore>,
    display_store: Arc<dyn DisplayStore>,
    fraud: Arc<FraudDetector>,
    audit: Arc<dyn AuditSink>,
}

impl AdEligibilityEngine {
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

    /// Check whether an ad may be shown right now.
    ///
    /// On success returns the matched unit, the active configuration, and the
    /// parsed settings for the caller to pass to
    /// [`super::AdDisplayLifecycle::create`]. On denial the error carries the
    /// reason and, for cooldown-style denials, retry metadata. Store faults
    /// never escape: they are audit-logged and reported as
    /// [`AdError::Internal`].
    pub async fn can_show_ad(
        &self,
        placement: Placement,
        session_id: &str,
        ip_address: &str,
        player_id: Option<PlayerId>,
    ) -> AdResult<AdGrant> {
        self.can_show_ad_at(placement, session_id, ip_address, player_id, Utc::now())
            .await
    }

    /// [`Self::can_show_ad`] with an explicit "now".
    pub async fn can_show_ad_at(
        &self,
        placement: Placement,
        session_id: &str,
        ip_address: &str,
        player_id: Option<PlayerId>,
        now: DateTime<Utc>,
    ) -> AdResult<AdGrant> {
        self.evaluate(placement, session_id, ip_address, player_id, now)
            .await
            .map_err(|failure| {
                failure.into_ad_error(self.audit.as_ref(), "ad_eligibility_error", Some(ip_address))
            })
    }

    async fn evaluate(
        &self,
        placement: Placement,
        session_id: &str,
        ip_address: &str,
        player_id: Option<PlayerId>,
        now: DateTime<Utc>,
    ) -> Result<AdGrant, OpFailure> {
        let Some(config) = self.config_store.active_config().await? else {
            return Err(AdError::NotConfigured.into());
        };

        let settings = config.settings();
        if !settings.placement_enabled(placement) {
            return Err(AdError::PlacementDisabled(placement).into());
        }

        let Some(ad_unit) = self
            .config_store
            .find_active_unit(config.id, placement)
            .await?
        else {
            return Err(AdError::NoAdUnit(placement).into());
        };

        self.check_interval(&ad_unit, session_id, ip_address, player_id, &settings, now)
            .await?;
        self.check_volume(session_id, ip_address, player_id, &settings, now)
            .await?;

        Ok(AdGrant {
            ad_unit,
            config,
            settings,
        })
    }

    /// Reject if the actor saw this unit inside the configured interval.
    /// Session is checked first, then IP, then player: the most specific
    /// scope wins the reporting.
    async fn check_interval(
        &self,
        ad_unit: &AdUnit,
        session_id: &str,
        ip_address: &str,
        player_id: Option<PlayerId>,
        settings: &AdSettings,
        now: DateTime<Utc>,
    ) -> Result<(), OpFailure> {
        let interval = interval_duration(settings);
        let since = window::cutoff(now, interval);

        let mut scopes = vec![
            (
                IntervalScope::Session,
                DisplayOwner::Session(session_id.to_string()),
            ),
            (IntervalScope::Ip, DisplayOwner::Ip(ip_address.to_string())),
        ];
        if let Some(player_id) = player_id {
            scopes.push((IntervalScope::Player, DisplayOwner::Player(player_id)));
        }

        for (scope, owner) in scopes {
            if let Some(recent) = self
                .display_store
                .find_recent(&owner, ad_unit.id, since)
                .await?
            {
                let retry_after = recent.displayed_at + interval;
                let seconds_remaining = (retry_after - now).num_seconds().max(0);
                return Err(AdError::IntervalNotElapsed {
                    scope,
                    retry_after,
                    seconds_remaining,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Volume limits across all units, then the fraud-score hold.
    async fn check_volume(
        &self,
        session_id: &str,
        ip_address: &str,
        player_id: Option<PlayerId>,
        settings: &AdSettings,
        now: DateTime<Utc>,
    ) -> Result<(), OpFailure> {
        let hour_ago = window::cutoff(now, Duration::hours(1));
        let day_ago = window::cutoff(now, Duration::hours(24));

        let ip_displays = self
            .display_store
            .count_since(&DisplayOwner::Ip(ip_address.to_string()), hour_ago)
            .await?;
        if ip_displays >= IP_HOURLY_LIMIT {
            return Err(AdError::VolumeLimitExceeded {
                scope: VolumeScope::IpHourly,
                retry_after: now + Duration::hours(1),
            }
            .into());
        }

        let session_displays = self
            .display_store
            .count_since(&DisplayOwner::Session(session_id.to_string()), day_ago)
            .await?;
        if session_displays >= SESSION_DAILY_LIMIT {
            return Err(AdError::VolumeLimitExceeded {
                scope: VolumeScope::SessionDaily,
                retry_after: now + Duration::hours(24),
            }
            .into());
        }

        if let Some(player_id) = player_id {
            let player_displays = self
                .display_store
                .count_since(&DisplayOwner::Player(player_id), day_ago)
                .await?;
            if player_displays >= PLAYER_DAILY_LIMIT {
                return Err(AdError::VolumeLimitExceeded {
                    scope: VolumeScope::PlayerDaily,
                    retry_after: now + Duration::hours(24),
                }
                .into());
            }

            let score = self.fraud.risk_score_at(player_id, now).await;
            if score > settings.fraud_detection_threshold {
                return Err(AdError::HighFraudScore { score }.into());
            }
        }

        Ok(())
    }
}
