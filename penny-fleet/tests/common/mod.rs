//! Shared helpers for fleet tests.

#![allow(dead_code)]

use async_trait::async_trait;
use penny_fleet::{
    BackendError, BackendResult, HealthState, NewObject, NewSpace, SchemaBackend, SearchQuery,
};
use penny_types::{
    BackendId, GraphStats, LiveRelation, LiveType, ObjectId, ObjectSummary, RelationId,
    RelationSpec, Space, TypeId, TypeSpec,
};
use std::sync::Arc;

/// Backend that only answers identity and health checks.
pub struct StubBackend {
    id: BackendId,
    healthy: bool,
}

impl StubBackend {
    pub fn healthy(url: &str) -> Arc<dyn SchemaBackend> {
        Arc::new(Self {
            id: BackendId::from_base_url(url),
            healthy: true,
        })
    }

    pub fn unhealthy(url: &str) -> Arc<dyn SchemaBackend> {
        Arc::new(Self {
            id: BackendId::from_base_url(url),
            healthy: false,
        })
    }

    fn unsupported<T>(&self) -> BackendResult<T> {
        Err(BackendError::Protocol(format!("{} is a stub", self.id)))
    }
}

#[async_trait]
impl SchemaBackend for StubBackend {
    fn backend_id(&self) -> &BackendId {
        &self.id
    }

    async fn list_types(&self, _space: &str) -> BackendResult<Vec<LiveType>> {
        Ok(Vec::new())
    }

    async fn list_relations(&self, _space: &str) -> BackendResult<Vec<LiveRelation>> {
        Ok(Vec::new())
    }

    async fn create_relation(
        &self,
        _space: &str,
        _spec: &RelationSpec,
    ) -> BackendResult<RelationId> {
        self.unsupported()
    }

    async fn create_type(
        &self,
        _space: &str,
        _spec: &TypeSpec,
        _relation_ids: &[RelationId],
    ) -> BackendResult<TypeId> {
        self.unsupported()
    }

    async fn set_type_relations(
        &self,
        _space: &str,
        _type_id: &TypeId,
        _relation_ids: &[RelationId],
    ) -> BackendResult<()> {
        self.unsupported()
    }

    async fn create_object(&self, _object: &NewObject) -> BackendResult<ObjectId> {
        self.unsupported()
    }

    async fn search(&self, _query: &SearchQuery) -> BackendResult<Vec<ObjectSummary>> {
        Ok(Vec::new())
    }

    async fn create_space(&self, _space: &NewSpace) -> BackendResult<Space> {
        self.unsupported()
    }

    async fn list_spaces(&self) -> BackendResult<Vec<Space>> {
        Ok(Vec::new())
    }

    async fn graph_stats(&self) -> BackendResult<GraphStats> {
        Ok(GraphStats::default())
    }

    async fn health(&self) -> HealthState {
        if self.healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy {
                reason: "connection refused".into(),
            }
        }
    }
}
