//! Error types for the fleet layer.

use penny_types::ValidationError;
use thiserror::Error;

/// Result type for calls against a single backend.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for routing and configuration.
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors returned by a schema backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection failure, timeout or 5xx.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Credentials were refused and could not be refreshed.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// A referenced entity exists but has not propagated to the backend's
    /// index yet.
    #[error("entity not yet visible: {0}")]
    NotYetVisible(String),

    /// The backend refused the request as invalid.
    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The backend answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    /// Returns true for the transient index-lag failure mode.
    pub fn is_transient_lag(&self) -> bool {
        matches!(self, BackendError::NotYetVisible(_))
    }
}

/// Errors raised while routing a call to a backend.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("unknown profile '{name}' (available: {})", .available.join(", "))]
    UnknownProfile {
        name: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    InvalidProfile(#[from] ValidationError),

    #[error("invalid fleet configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
