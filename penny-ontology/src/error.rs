//! Error types for the reconciliation engine.

use penny_fleet::{BackendError, FleetError};
use penny_types::{BackendId, TypeId, ValidationError};
use thiserror::Error;

/// Result type for engine operations.
pub type OntologyResult<T> = Result<T, OntologyError>;

/// Errors surfaced by the engine to its callers.
#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("unknown profile '{name}' (available: {})", .available.join(", "))]
    UnknownProfile {
        name: String,
        available: Vec<String>,
    },

    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("authentication expired: {0}")]
    AuthExpired(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// More than one live type carries the requested type name.
    #[error("type '{type_name}' matches {} live types", .existing_ids.len())]
    RelationConflict {
        type_name: String,
        existing_ids: Vec<TypeId>,
    },

    #[error("entity not yet visible: {0}")]
    EntityNotYetVisible(String),

    #[error("schema did not converge within the retry budget: {last}")]
    SchemaNotConverged { last: Box<OntologyError> },

    #[error("write queue for {backend} is full ({depth} pending)")]
    WriteQueueOverflow { backend: BackendId, depth: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OntologyError {
    /// Returns true for the index-propagation lag the retrier absorbs.
    pub fn is_transient_lag(&self) -> bool {
        matches!(self, OntologyError::EntityNotYetVisible(_))
    }

    /// Stable snake_case name of the error kind, used in reports and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            OntologyError::UnknownProfile { .. } => "unknown_profile",
            OntologyError::BackendUnreachable(_) => "backend_unreachable",
            OntologyError::AuthExpired(_) => "auth_expired",
            OntologyError::Validation(_) => "validation",
            OntologyError::RelationConflict { .. } => "relation_conflict",
            OntologyError::EntityNotYetVisible(_) => "entity_not_yet_visible",
            OntologyError::SchemaNotConverged { .. } => "schema_not_converged",
            OntologyError::WriteQueueOverflow { .. } => "write_queue_overflow",
            OntologyError::Cancelled => "cancelled",
            OntologyError::Rejected { .. } => "rejected",
            OntologyError::Protocol(_) => "protocol",
            OntologyError::Config(_) => "config",
        }
    }
}

impl From<BackendError> for OntologyError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unreachable(msg) => OntologyError::BackendUnreachable(msg),
            BackendError::AuthExpired(msg) => OntologyError::AuthExpired(msg),
            BackendError::NotYetVisible(msg) => OntologyError::EntityNotYetVisible(msg),
            BackendError::Rejected { status, body } => OntologyError::Rejected { status, body },
            BackendError::Protocol(msg) => OntologyError::Protocol(msg),
            BackendError::Serialization(e) => OntologyError::Protocol(e.to_string()),
        }
    }
}

impl From<FleetError> for OntologyError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::UnknownProfile { name, available } => {
                OntologyError::UnknownProfile { name, available }
            }
            FleetError::InvalidProfile(e) => OntologyError::Validation(e),
            FleetError::Config(msg) => OntologyError::Config(msg),
            FleetError::Backend(e) => e.into(),
        }
    }
}
