//! Live schema state as reported by a backend.
//!
//! A snapshot is fetched fresh for every reconciliation run and never cached
//! across runs.

use crate::ids::{ObjectId, RelationId, SpaceId, TypeId};
use crate::name::normalize_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An object type that exists on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveType {
    pub id: TypeId,
    pub name: String,
    /// Relations attached to the type, when the backend reports them.
    #[serde(
        default,
        alias = "relationIds",
        alias = "recommendedRelations",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation_ids: Option<Vec<RelationId>>,
}

/// A relation that exists on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRelation {
    pub id: RelationId,
    pub name: String,
    /// Raw format string; backends may report formats this crate does not model.
    #[serde(default)]
    pub format: String,
}

/// Types and the global relation dictionary of one space at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSchemaSnapshot {
    pub types: Vec<LiveType>,
    pub relations: Vec<LiveRelation>,
    pub fetched_at: DateTime<Utc>,
}

impl LiveSchemaSnapshot {
    pub fn new(types: Vec<LiveType>, relations: Vec<LiveRelation>) -> Self {
        Self {
            types,
            relations,
            fetched_at: Utc::now(),
        }
    }

    /// An empty space.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn has_relation(&self, id: &RelationId) -> bool {
        self.relations.iter().any(|r| &r.id == id)
    }

    pub fn has_type(&self, id: &TypeId) -> bool {
        self.types.iter().any(|t| &t.id == id)
    }

    pub fn type_by_id(&self, id: &TypeId) -> Option<&LiveType> {
        self.types.iter().find(|t| &t.id == id)
    }

    /// All live types whose name normalizes to `key`.
    pub fn types_named(&self, key: &str) -> Vec<&LiveType> {
        self.types
            .iter()
            .filter(|t| normalize_name(&t.name) == key)
            .collect()
    }
}

/// Lightweight summary of an object returned by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "typeId", skip_serializing_if = "Option::is_none")]
    pub type_id: Option<TypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A space (workspace) hosted by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, alias = "isPersonal")]
    pub is_personal: bool,
}

/// Aggregate counts reported by a backend for its whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStats {
    #[serde(alias = "totalObjects")]
    pub total_objects: u64,
    #[serde(alias = "totalTypes")]
    pub total_types: u64,
    #[serde(alias = "totalRelations")]
    pub total_relations: u64,
    #[serde(alias = "totalSpaces")]
    pub total_spaces: u64,
    #[serde(alias = "objectsByType")]
    pub objects_by_type: BTreeMap<String, u64>,
    #[serde(alias = "storageBytes")]
    pub storage_bytes: u64,
}
