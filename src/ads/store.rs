//! Persistence seam for ad configuration and display records.
//!
//! Engines depend on the [`ConfigStore`] and [`DisplayStore`] traits, never on
//! a concrete backend: production injects [`PgAdStore`], tests inject
//! [`MemoryAdStore`]. Both implementations answer "since" queries with a
//! strict comparison (`displayed_at > since`) so window semantics stay
//! consistent with the rest of the crate.

use super::errors::{StoreError, StoreResult};
use super::models::{
    AdDisplay, AdNetworkConfig, AdUnit, DisplayId, DisplayOwner, DisplayStatus, Placement, UnitId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Read access to the active ad-network configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The active configuration, if one exists.
    async fn active_config(&self) -> StoreResult<Option<AdNetworkConfig>>;

    /// An active ad unit serving the placement under the given configuration.
    async fn find_active_unit(
        &self,
        config_id: i64,
        placement: Placement,
    ) -> StoreResult<Option<AdUnit>>;
}

/// Persistence for ad display records.
#[async_trait]
pub trait DisplayStore: Send + Sync {
    /// Persist a newly created display record.
    async fn insert(&self, display: &AdDisplay) -> StoreResult<()>;

    /// Persist a lifecycle mutation of an existing record.
    async fn update(&self, display: &AdDisplay) -> StoreResult<()>;

    /// Fetch a display record by id.
    async fn get(&self, id: DisplayId) -> StoreResult<Option<AdDisplay>>;

    /// Most recent display for the actor against the given unit, strictly
    /// after `since`.
    async fn find_recent(
        &self,
        owner: &DisplayOwner,
        ad_unit_id: UnitId,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<AdDisplay>>;

    /// Number of displays for the actor (any unit) strictly after `since`.
    async fn count_since(&self, owner: &DisplayOwner, since: DateTime<Utc>) -> StoreResult<u64>;

    /// All displays in `[start, end)`, for analytics.
    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AdDisplay>>;
}

/// PostgreSQL-backed store.
pub struct PgAdStore {
    pool: Arc<PgPool>,
}

impl PgAdStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn map_display_row(row: &sqlx::postgres::PgRow) -> StoreResult<AdDisplay> {
    let placement: String = row.get("placement");
    let placement = placement.parse::<Placement>().map_err(|_| StoreError::Corrupt {
        message: format!("invalid placement in ad_displays: {placement}"),
    })?;

    let status: String = row.get("status");
    let status = status
        .parse::<DisplayStatus>()
        .map_err(|_| StoreError::Corrupt {
            message: format!("invalid status in ad_displays: {status}"),
        })?;

    Ok(AdDisplay {
        id: row.get("id"),
        ad_unit_id: row.get("ad_unit_id"),
        placement,
        player_id: row.get("player_id"),
        session_id: row.get("session_id"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        displayed_at: row.get::<chrono::NaiveDateTime, _>("displayed_at").and_utc(),
        protection_end_time: row
            .get::<chrono::NaiveDateTime, _>("protection_end_time")
            .and_utc(),
        status,
        click_timestamp: row
            .get::<Option<chrono::NaiveDateTime>, _>("click_timestamp")
            .map(|dt| dt.and_utc()),
        closed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("closed_at")
            .map(|dt| dt.and_utc()),
        was_clicked: row.get("was_clicked"),
    })
}

const DISPLAY_COLUMNS: &str = "id, ad_unit_id, placement, player_id, session_id, ip_address, \
     user_agent, displayed_at, protection_end_time, status, click_timestamp, closed_at, was_clicked";

#[async_trait]
impl ConfigStore for PgAdStore {
    async fn active_config(&self) -> StoreResult<Option<AdNetworkConfig>> {
        let row = sqlx::query(
            "SELECT id, publisher_id, is_active, ad_settings FROM ad_configs WHERE is_active LIMIT 1",
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|r| AdNetworkConfig {
            id: r.get("id"),
            publisher_id: r.get("publisher_id"),
            is_active: r.get("is_active"),
            ad_settings: r.get("ad_settings"),
        }))
    }

    async fn find_active_unit(
        &self,
        config_id: i64,
        placement: Placement,
    ) -> StoreResult<Option<AdUnit>> {
        let row = sqlx::query(
            "SELECT id, config_id, unit_id, unit_name, ad_type, placement, is_active
             FROM ad_units
             WHERE config_id = $1 AND placement = $2 AND is_active
             LIMIT 1",
        )
        .bind(config_id)
        .bind(placement.to_string())
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(|r| {
            let placement: String = r.get("placement");
            let placement = placement.parse::<Placement>().map_err(|_| StoreError::Corrupt {
                message: format!("invalid placement in ad_units: {placement}"),
            })?;
            Ok(AdUnit {
                id: r.get("id"),
                config_id: r.get("config_id"),
                unit_id: r.get("unit_id"),
                unit_name: r.get("unit_name"),
                ad_type: r.get("ad_type"),
                placement,
                is_active: r.get("is_active"),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl DisplayStore for PgAdStore {
    async fn insert(&self, display: &AdDisplay) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO ad_displays (id, ad_unit_id, placement, player_id, session_id,
                 ip_address, user_agent, displayed_at, protection_end_time, status,
                 click_timestamp, closed_at, was_clicked)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(display.id)
        .bind(display.ad_unit_id)
        .bind(display.placement.to_string())
        .bind(display.player_id)
        .bind(&display.session_id)
        .bind(&display.ip_address)
        .bind(&display.user_agent)
        .bind(display.displayed_at.naive_utc())
        .bind(display.protection_end_time.naive_utc())
        .bind(display.status.to_string())
        .bind(display.click_timestamp.map(|dt| dt.naive_utc()))
        .bind(display.closed_at.map(|dt| dt.naive_utc()))
        .bind(display.was_clicked)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn update(&self, display: &AdDisplay) -> StoreResult<()> {
        sqlx::query(
            "UPDATE ad_displays
             SET status = $2, click_timestamp = $3, closed_at = $4, was_clicked = $5
             WHERE id = $1",
        )
        .bind(display.id)
        .bind(display.status.to_string())
        .bind(display.click_timestamp.map(|dt| dt.naive_utc()))
        .bind(display.closed_at.map(|dt| dt.naive_utc()))
        .bind(display.was_clicked)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get(&self, id: DisplayId) -> StoreResult<Option<AdDisplay>> {
        let row = sqlx::query(&format!(
            "SELECT {DISPLAY_COLUMNS} FROM ad_displays WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(map_display_row).transpose()
    }

    async fn find_recent(
        &self,
        owner: &DisplayOwner,
        ad_unit_id: UnitId,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<AdDisplay>> {
        // Column name comes from a closed match, never from input.
        let (column, value) = owner_column(owner);
        let sql = format!(
            "SELECT {DISPLAY_COLUMNS} FROM ad_displays
             WHERE {column} = $1 AND ad_unit_id = $2 AND displayed_at > $3
             ORDER BY displayed_at DESC
             LIMIT 1"
        );

        let row = match value {
            OwnerBind::Text(value) => {
                sqlx::query(&sql)
                    .bind(value)
                    .bind(ad_unit_id)
                    .bind(since.naive_utc())
                    .fetch_optional(self.pool.as_ref())
                    .await?
            }
            OwnerBind::Player(id) => {
                sqlx::query(&sql)
                    .bind(id)
                    .bind(ad_unit_id)
                    .bind(since.naive_utc())
                    .fetch_optional(self.pool.as_ref())
                    .await?
            }
        };

        row.as_ref().map(map_display_row).transpose()
    }

    async fn count_since(&self, owner: &DisplayOwner, since: DateTime<Utc>) -> StoreResult<u64> {
        let (column, value) = owner_column(owner);
        let sql = format!(
            "SELECT COUNT(*) AS total FROM ad_displays WHERE {column} = $1 AND displayed_at > $2"
        );

        let row = match value {
            OwnerBind::Text(value) => {
                sqlx::query(&sql)
                    .bind(value)
                    .bind(since.naive_utc())
                    .fetch_one(self.pool.as_ref())
                    .await?
            }
            OwnerBind::Player(id) => {
                sqlx::query(&sql)
                    .bind(id)
                    .bind(since.naive_utc())
                    .fetch_one(self.pool.as_ref())
                    .await?
            }
        };

        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }

    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AdDisplay>> {
        let rows = sqlx::query(&format!(
            "SELECT {DISPLAY_COLUMNS} FROM ad_displays
             WHERE displayed_at >= $1 AND displayed_at < $2
             ORDER BY displayed_at"
        ))
        .bind(start.naive_utc())
        .bind(end.naive_utc())
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(map_display_row).collect()
    }
}

enum OwnerBind<'a> {
    Text(&'a str),
    Player(i64),
}

fn owner_column(owner: &DisplayOwner) -> (&'static str, OwnerBind<'_>) {
    match owner {
        DisplayOwner::Session(session_id) => ("session_id", OwnerBind::Text(session_id)),
        DisplayOwner::Ip(ip_address) => ("ip_address", OwnerBind::Text(ip_address)),
        DisplayOwner::Player(player_id) => ("player_id", OwnerBind::Player(*player_id)),
    }
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct MemoryAdStore {
    config: RwLock<Option<AdNetworkConfig>>,
    units: RwLock<Vec<AdUnit>>,
    displays: RwLock<HashMap<DisplayId, AdDisplay>>,
}

impl MemoryAdStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or clear) the active configuration.
    pub async fn set_config(&self, config: Option<AdNetworkConfig>) {
        *self.config.write().await = config;
    }

    /// Register an ad unit.
    pub async fn add_unit(&self, unit: AdUnit) {
        self.units.write().await.push(unit);
    }

    fn owner_matches(owner: &DisplayOwner, display: &AdDisplay) -> bool {
        match owner {
            DisplayOwner::Session(session_id) => display.session_id == *session_id,
            DisplayOwner::Ip(ip_address) => display.ip_address == *ip_address,
            DisplayOwner::Player(player_id) => display.player_id == Some(*player_id),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryAdStore {
    async fn active_config(&self) -> StoreResult<Option<AdNetworkConfig>> {
        Ok(self.config.read().await.clone().filter(|c| c.is_active))
    }

    async fn find_active_unit(
        &self,
        config_id: i64,
        placement: Placement,
    ) -> StoreResult<Option<AdUnit>> {
        Ok(self
            .units
            .read()
            .await
            .iter()
            .find(|u| u.config_id == config_id && u.placement == placement && u.is_active)
            .cloned())
    }
}

#[async_trait]
impl DisplayStore for MemoryAdStore {
    async fn insert(&self, display: &AdDisplay) -> StoreResult<()> {
        self.displays
            .write()
            .await
            .insert(display.id, display.clone());
        Ok(())
    }

    async fn update(&self, display: &AdDisplay) -> StoreResult<()> {
        self.displays
            .write()
            .await
            .insert(display.id, display.clone());
        Ok(())
    }

    async fn get(&self, id: DisplayId) -> StoreResult<Option<AdDisplay>> {
        Ok(self.displays.read().await.get(&id).cloned())
    }

    async fn find_recent(
        &self,
        owner: &DisplayOwner,
        ad_unit_id: UnitId,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<AdDisplay>> {
        Ok(self
            .displays
            .read()
            .await
            .values()
            .filter(|d| {
                d.ad_unit_id == ad_unit_id
                    && d.displayed_at > since
                    && Self::owner_matches(owner, d)
            })
            .max_by_key(|d| d.displayed_at)
            .cloned())
    }

    async fn count_since(&self, owner: &DisplayOwner, since: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self
            .displays
            .read()
            .await
            .values()
            .filter(|d| d.displayed_at > since && Self::owner_matches(owner, d))
            .count() as u64)
    }

    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AdDisplay>> {
        let mut displays: Vec<_> = self
            .displays
            .read()
            .await
            .values()
            .filter(|d| d.displayed_at >= start && d.displayed_at < end)
            .cloned()
            .collect();
        displays.sort_by_key(|d| d.displayed_at);
        Ok(displays)
    }
}
