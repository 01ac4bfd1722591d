//! Shared helpers for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use penny_fleet::{
    BackendError, BackendResult, HealthState, NewObject, NewSpace, ProfileRouter, SchemaBackend,
    SearchQuery,
};
use penny_types::{
    BackendId, GraphStats, LiveRelation, LiveType, ObjectId, ObjectSummary, ProfileName,
    RelationId, RelationSpec, Space, SpaceId, TypeId, TypeSpec,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// A write the backend received, with its dispatch instant.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub operation: String,
    pub target: String,
    pub at: Instant,
    pub succeeded: bool,
}

struct Hidden<T> {
    entity: T,
    reads_left: usize,
}

#[derive(Default)]
struct State {
    types: Vec<Hidden<LiveType>>,
    relations: Vec<Hidden<LiveRelation>>,
    objects: Vec<ObjectSummary>,
    spaces: Vec<Space>,
    writes: Vec<WriteRecord>,
    next_id: usize,
    failures: HashMap<&'static str, usize>,
    read_lag: usize,
    report_relation_ids: bool,
    unreachable: bool,
}

/// In-memory schema backend recording every write it receives.
pub struct InMemoryBackend {
    id: BackendId,
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            id: BackendId::from_base_url(url),
            state: Mutex::new(State {
                report_relation_ids: true,
                ..State::default()
            }),
        })
    }

    /// Omit `relation_ids` from listed types.
    pub fn without_relation_ids(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().unwrap().report_relation_ids = false;
        self
    }

    /// Fail the next `times` calls of `operation` with `NotYetVisible`.
    pub fn fail_not_visible(&self, operation: &'static str, times: usize) {
        self.state.lock().unwrap().failures.insert(operation, times);
    }

    /// Fail every read as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Newly created entities stay unlisted for this many list calls.
    pub fn set_read_lag(&self, reads: usize) {
        self.state.lock().unwrap().read_lag = reads;
    }

    pub fn seed_relation(&self, id: &str, name: &str, format: &str) {
        self.state.lock().unwrap().relations.push(Hidden {
            entity: LiveRelation {
                id: RelationId::from(id),
                name: name.to_string(),
                format: format.to_string(),
            },
            reads_left: 0,
        });
    }

    pub fn seed_type(&self, id: &str, name: &str, relation_ids: &[&str]) {
        self.state.lock().unwrap().types.push(Hidden {
            entity: LiveType {
                id: TypeId::from(id),
                name: name.to_string(),
                relation_ids: Some(relation_ids.iter().map(|r| RelationId::from(*r)).collect()),
            },
            reads_left: 0,
        });
    }

    pub fn seed_object(&self, id: &str, name: &str, type_id: &str) {
        self.state.lock().unwrap().objects.push(ObjectSummary {
            id: ObjectId::from(id),
            name: name.to_string(),
            type_id: Some(TypeId::from(type_id)),
            snippet: None,
        });
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn relation_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.relations.iter().map(|r| r.entity.name.clone()).collect()
    }

    pub fn type_relations(&self, id: &str) -> Option<Vec<RelationId>> {
        let state = self.state.lock().unwrap();
        state
            .types
            .iter()
            .find(|t| t.entity.id.as_str() == id)
            .and_then(|t| t.entity.relation_ids.clone())
    }

    fn record(&self, operation: &'static str, target: &str) -> BackendResult<String> {
        let mut state = self.state.lock().unwrap();
        let failing = state.failures.get(operation).copied().unwrap_or(0);
        let succeeded = failing == 0;
        state.writes.push(WriteRecord {
            operation: operation.to_string(),
            target: target.to_string(),
            at: Instant::now(),
            succeeded,
        });
        if !succeeded {
            state.failures.insert(operation, failing - 1);
            return Err(BackendError::NotYetVisible(format!("{operation} {target}")));
        }
        state.next_id += 1;
        Ok(state.next_id.to_string())
    }
}

fn visible<T: Clone>(entities: &mut [Hidden<T>]) -> Vec<T> {
    let mut out = Vec::new();
    for hidden in entities.iter_mut() {
        if hidden.reads_left == 0 {
            out.push(hidden.entity.clone());
        } else {
            hidden.reads_left -= 1;
        }
    }
    out
}

#[async_trait]
impl SchemaBackend for InMemoryBackend {
    fn backend_id(&self) -> &BackendId {
        &self.id
    }

    async fn list_types(&self, _space: &str) -> BackendResult<Vec<LiveType>> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(BackendError::Unreachable("connection refused".into()));
        }
        let report = state.report_relation_ids;
        Ok(visible(&mut state.types)
            .into_iter()
            .map(|mut t| {
                if !report {
                    t.relation_ids = None;
                }
                t
            })
            .collect())
    }

    async fn list_relations(&self, _space: &str) -> BackendResult<Vec<LiveRelation>> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(BackendError::Unreachable("connection refused".into()));
        }
        Ok(visible(&mut state.relations))
    }

    async fn create_relation(
        &self,
        _space: &str,
        spec: &RelationSpec,
    ) -> BackendResult<RelationId> {
        let n = self.record("create_relation", spec.name.trim())?;
        let id = RelationId::new(format!("rel_{n}"));
        let mut state = self.state.lock().unwrap();
        let reads_left = state.read_lag;
        state.relations.push(Hidden {
            entity: LiveRelation {
                id: id.clone(),
                name: spec.name.trim().to_string(),
                format: spec.format.as_str().to_string(),
            },
            reads_left,
        });
        Ok(id)
    }

    async fn create_type(
        &self,
        _space: &str,
        spec: &TypeSpec,
        relation_ids: &[RelationId],
    ) -> BackendResult<TypeId> {
        let n = self.record("create_type", spec.name.trim())?;
        let id = TypeId::new(format!("type_{n}"));
        let mut state = self.state.lock().unwrap();
        let reads_left = state.read_lag;
        state.types.push(Hidden {
            entity: LiveType {
                id: id.clone(),
                name: spec.name.trim().to_string(),
                relation_ids: Some(relation_ids.to_vec()),
            },
            reads_left,
        });
        Ok(id)
    }

    async fn set_type_relations(
        &self,
        _space: &str,
        type_id: &TypeId,
        relation_ids: &[RelationId],
    ) -> BackendResult<()> {
        self.record("set_type_relations", type_id.as_str())?;
        let mut state = self.state.lock().unwrap();
        match state.types.iter_mut().find(|t| &t.entity.id == type_id) {
            Some(t) => {
                t.entity.relation_ids = Some(relation_ids.to_vec());
                Ok(())
            }
            None => Err(BackendError::NotYetVisible(type_id.to_string())),
        }
    }

    async fn create_object(&self, object: &NewObject) -> BackendResult<ObjectId> {
        let n = self.record("create_object", object.type_id.as_str())?;
        let id = ObjectId::new(format!("obj_{n}"));
        self.state.lock().unwrap().objects.push(ObjectSummary {
            id: id.clone(),
            name: object.name.clone().unwrap_or_default(),
            type_id: Some(object.type_id.clone()),
            snippet: None,
        });
        Ok(id)
    }

    async fn search(&self, query: &SearchQuery) -> BackendResult<Vec<ObjectSummary>> {
        let state = self.state.lock().unwrap();
        let needle = query.query.to_lowercase();
        Ok(state
            .objects
            .iter()
            .filter(|o| o.name.to_lowercase().contains(&needle))
            .filter(|o| query.type_id.is_none() || o.type_id == query.type_id)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn create_space(&self, space: &NewSpace) -> BackendResult<Space> {
        let n = self.record("create_space", &space.name)?;
        let created = Space {
            id: SpaceId::new(format!("space_{n}")),
            name: space.name.clone(),
            icon: space.icon.clone(),
            is_personal: false,
        };
        self.state.lock().unwrap().spaces.push(created.clone());
        Ok(created)
    }

    async fn list_spaces(&self) -> BackendResult<Vec<Space>> {
        Ok(self.state.lock().unwrap().spaces.clone())
    }

    async fn graph_stats(&self) -> BackendResult<GraphStats> {
        let state = self.state.lock().unwrap();
        let mut stats = GraphStats {
            total_objects: state.objects.len() as u64,
            total_types: state.types.len() as u64,
            total_relations: state.relations.len() as u64,
            total_spaces: state.spaces.len() as u64,
            ..GraphStats::default()
        };
        for object in &state.objects {
            let key = object.type_id.as_ref().map(|t| t.to_string()).unwrap_or_default();
            *stats.objects_by_type.entry(key).or_default() += 1;
        }
        Ok(stats)
    }

    async fn health(&self) -> HealthState {
        HealthState::Healthy
    }
}

pub fn profile(name: &str) -> ProfileName {
    ProfileName::parse(name).unwrap()
}

/// Router over `personal` (default) and `work`.
pub fn two_profile_router(
    personal: &Arc<InMemoryBackend>,
    work: &Arc<InMemoryBackend>,
) -> Arc<ProfileRouter> {
    let routes: Vec<(ProfileName, Arc<dyn SchemaBackend>)> = vec![
        (profile("personal"), personal.clone()),
        (profile("work"), work.clone()),
    ];
    Arc::new(ProfileRouter::new(profile("personal"), routes).unwrap())
}
