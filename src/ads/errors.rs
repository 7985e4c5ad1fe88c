//! Error types for the ad pacing engines.

use super::models::{DisplayId, Placement};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for ad engine operations
pub type AdResult<T> = Result<T, AdError>;

/// Scope that tripped an interval check, in reporting precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalScope {
    Session,
    Ip,
    Player,
}

impl std::fmt::Display for IntervalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalScope::Session => write!(f, "session"),
            IntervalScope::Ip => write!(f, "ip"),
            IntervalScope::Player => write!(f, "player"),
        }
    }
}

/// Scope that tripped a volume limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeScope {
    IpHourly,
    SessionDaily,
    PlayerDaily,
}

impl std::fmt::Display for VolumeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeScope::IpHourly => write!(f, "ip_hourly"),
            VolumeScope::SessionDaily => write!(f, "session_daily"),
            VolumeScope::PlayerDaily => write!(f, "player_daily"),
        }
    }
}

/// Failure kinds for eligibility and lifecycle operations.
///
/// Every variant is recoverable by the caller; the external layer maps these
/// to transport status codes. `Internal` is the only variant produced from an
/// unexpected fault, and it is always audit-logged at the point of conversion.
#[derive(Debug, Error)]
pub enum AdError {
    /// No active ad network configuration exists
    #[error("ad network is not configured")]
    NotConfigured,

    /// Ads are disabled for the requested placement
    #[error("ads are disabled for placement {0}")]
    PlacementDisabled(Placement),

    /// No active ad unit serves the requested placement
    #[error("no active ad unit for placement {0}")]
    NoAdUnit(Placement),

    /// A display for this actor and unit is still inside the interval window
    #[error("ad interval not reached ({scope})")]
    IntervalNotElapsed {
        scope: IntervalScope,
        retry_after: DateTime<Utc>,
        seconds_remaining: i64,
    },

    /// Too many displays for this actor in the trailing window
    #[error("display volume limit exceeded ({scope})")]
    VolumeLimitExceeded {
        scope: VolumeScope,
        retry_after: DateTime<Utc>,
    },

    /// The player's risk score is above the configured threshold. A hold,
    /// not a cooldown: no retry time is offered.
    #[error("high fraud score detected ({score})")]
    HighFraudScore { score: u8 },

    /// No display record with the given id
    #[error("ad display not found: {0}")]
    NotFound(DisplayId),

    /// Neither the session id nor the IP address matches the display record
    #[error("security violation: session/IP mismatch for display {0}")]
    SecurityViolation(DisplayId),

    /// The protection window has not elapsed yet
    #[error("ad protection period not expired")]
    ProtectionActive {
        can_close_at: DateTime<Utc>,
        seconds_remaining: i64,
    },

    /// The display is not in a state that admits the requested transition
    #[error("ad display is not available for this action")]
    NotDisplayed,

    /// An unexpected internal failure, already audit-logged
    #[error("internal error")]
    Internal,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the persistence seam. These never cross an engine
/// boundary: each public operation converts them to [`AdError::Internal`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row failed validation on read
    #[error("corrupt row: {message}")]
    Corrupt { message: String },
}

/// Internal failure of an engine operation, before boundary conversion.
///
/// Denials pass through as-is; store faults are logged and collapsed to
/// [`AdError::Internal`] so callers never see backend details.
pub(crate) enum OpFailure {
    Denied(AdError),
    Store(StoreError),
}

impl From<AdError> for OpFailure {
    fn from(err: AdError) -> Self {
        OpFailure::Denied(err)
    }
}

impl From<StoreError> for OpFailure {
    fn from(err: StoreError) -> Self {
        OpFailure::Store(err)
    }
}

impl OpFailure {
    pub(crate) fn into_ad_error(
        self,
        audit: &dyn crate::audit::AuditSink,
        operation: &str,
        actor: Option<&str>,
    ) -> AdError {
        match self {
            OpFailure::Denied(err) => err,
            OpFailure::Store(err) => {
                log::error!("{operation} failed: {err}");
                audit.log_event(
                    operation,
                    &err.to_string(),
                    crate::audit::Severity::Error,
                    actor,
                );
                AdError::Internal
            }
        }
    }
}
