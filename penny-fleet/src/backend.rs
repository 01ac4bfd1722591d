//! Schema backend abstraction.
//!
//! Defines the capability the reconciliation engine needs from an identity
//! node. The engine never knows how a backend process is started or
//! restarted; it only sees this request/response contract.

use crate::error::BackendResult;
use async_trait::async_trait;
use penny_types::{
    BackendId, GraphStats, LiveRelation, LiveSchemaSnapshot, LiveType, ObjectId, ObjectSummary,
    RelationId, RelationSpec, Space, TypeId, TypeSpec,
};
use serde::{Deserialize, Serialize};

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Upper bound on search results per call.
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Reported health of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy { reason: String },
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

/// An object to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObject {
    pub type_id: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
}

impl NewObject {
    pub fn new(type_id: TypeId, fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            type_id,
            name: None,
            fields,
            space_id: None,
        }
    }
}

/// A space to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSpace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NewSpace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
        }
    }
}

/// A full-text search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<TypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    pub limit: u32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            type_id: None,
            space_id: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Sets the result limit, clamped to `1..=MAX_SEARCH_LIMIT`.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        self
    }
}

/// A stateful graph-database backend reachable over its schema/object API.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// Identity of this backend's write path.
    fn backend_id(&self) -> &BackendId;

    /// Lists the object types of a space.
    async fn list_types(&self, space: &str) -> BackendResult<Vec<LiveType>>;

    /// Lists the global relation dictionary of a space.
    async fn list_relations(&self, space: &str) -> BackendResult<Vec<LiveRelation>>;

    /// Creates a relation and returns its id.
    async fn create_relation(&self, space: &str, spec: &RelationSpec)
    -> BackendResult<RelationId>;

    /// Creates a type carrying the given relations and returns its id.
    async fn create_type(
        &self,
        space: &str,
        spec: &TypeSpec,
        relation_ids: &[RelationId],
    ) -> BackendResult<TypeId>;

    /// Replaces the relation set attached to a type.
    async fn set_type_relations(
        &self,
        space: &str,
        type_id: &TypeId,
        relation_ids: &[RelationId],
    ) -> BackendResult<()>;

    /// Creates an object of an existing type.
    async fn create_object(&self, object: &NewObject) -> BackendResult<ObjectId>;

    /// Searches objects.
    async fn search(&self, query: &SearchQuery) -> BackendResult<Vec<ObjectSummary>>;

    /// Creates a space.
    async fn create_space(&self, space: &NewSpace) -> BackendResult<Space>;

    /// Lists the spaces hosted by this backend.
    async fn list_spaces(&self) -> BackendResult<Vec<Space>>;

    /// Aggregate statistics over the backend's whole graph.
    async fn graph_stats(&self) -> BackendResult<GraphStats>;

    /// Reports whether the backend answers.
    async fn health(&self) -> HealthState;

    /// Fetches types and relations together as one snapshot.
    async fn fetch_snapshot(&self, space: &str) -> BackendResult<LiveSchemaSnapshot> {
        let (types, relations) =
            futures::try_join!(self.list_types(space), self.list_relations(space))?;
        Ok(LiveSchemaSnapshot::new(types, relations))
    }
}
