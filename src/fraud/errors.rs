//! Error types for the fraud scoring module.

use thiserror::Error;

/// Result type for fraud operations
pub type FraudResult<T> = Result<T, FraudError>;

/// Fraud scoring errors
#[derive(Debug, Error)]
pub enum FraudError {
    /// Alert not found
    #[error("fraud alert not found: {0}")]
    AlertNotFound(i64),
}
