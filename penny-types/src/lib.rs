//! Core type definitions for the PENNY knowledge core.
//!
//! This crate defines the backend-agnostic types shared by the router,
//! the reconciliation engine and the gateway:
//! - Session, profile and backend identifiers
//! - Remote entity identifiers (types, relations, objects)
//! - The declarative schema manifest and its boundary validation
//! - The live schema snapshot, spaces and graph statistics read from a backend
//!
//! Nothing in here performs I/O.

mod ids;
mod live;
mod manifest;
mod name;

pub use ids::{BackendId, ObjectId, ProfileName, RelationId, SessionId, SpaceId, TypeId};
pub use live::{GraphStats, LiveRelation, LiveSchemaSnapshot, LiveType, ObjectSummary, Space};
pub use manifest::{
    Layout, RelationFormat, RelationSpec, SchemaManifest, TypeSpec, MAX_NAME_LEN,
};
pub use name::normalize_name;

/// Result type alias for boundary validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// A payload failed validation at the boundary, before any reconciliation
/// logic ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {path}: {message}")]
pub struct ValidationError {
    /// Location of the offending value, e.g. `ensure_types[1].relations[0].name`.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}
