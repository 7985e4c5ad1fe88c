//! Security/audit event sink.
//!
//! Engines report notable events (limit breaches, security violations,
//! internal faults) through [`AuditSink`]. The sink is fire-and-forget: it is
//! infallible and never affects control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Audit event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A captured audit event (used by [`MemoryAuditSink`]).
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub recorded_at: DateTime<Utc>,
    pub event_type: String,
    pub message: String,
    pub severity: Severity,
    pub actor: Option<String>,
}

/// Sink for security events raised by the engines.
///
/// Implementations must not block and must not fail; anything that can go
/// wrong downstream (a full channel, a dead log shipper) is the sink's
/// problem, not the caller's.
pub trait AuditSink: Send + Sync {
    /// Record a security event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - Machine-readable event tag (e.g. `ad_close_security_violation`)
    /// * `message` - Human-readable description
    /// * `severity` - Event severity
    /// * `actor` - Session id, IP address, or player id the event concerns
    fn log_event(&self, event_type: &str, message: &str, severity: Severity, actor: Option<&str>);
}

/// Default sink routing events through the `log` facade.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn log_event(&self, event_type: &str, message: &str, severity: Severity, actor: Option<&str>) {
        match severity {
            Severity::Info => log::info!(
                "SECURITY [{}] actor={}: {}",
                event_type,
                actor.unwrap_or("unknown"),
                message
            ),
            Severity::Warning => log::warn!(
                "SECURITY [{}] actor={}: {}",
                event_type,
                actor.unwrap_or("unknown"),
                message
            ),
            Severity::Error | Severity::Critical => log::error!(
                "SECURITY [{}] severity={} actor={}: {}",
                event_type,
                severity,
                actor.unwrap_or("unknown"),
                message
            ),
        }
    }
}

/// Sink that captures events in memory so tests can assert on them.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Count of captured events with the given type tag.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_event(&self, event_type: &str, message: &str, severity: Severity, actor: Option<&str>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(AuditEvent {
                recorded_at: Utc::now(),
                event_type: event_type.to_string(),
                message: message.to_string(),
                severity,
                actor: actor.map(str::to_string),
            });
        }
    }
}
