//! Ontology reconciler.
//!
//! Brings one space of one backend in line with a [`SchemaManifest`]. A run
//! moves through `Fetching → Diffing → Planning → Executing → Verifying →
//! Done`, or ends in `Failed`.
//!
//! The live snapshot and the plan are built fresh for every run and dropped
//! afterwards. Writes go through the backend's [`WriteSerializer`] queue.
//! Steps that depend on just-created relations, and the final visibility
//! check, go through the [`ConvergenceRetrier`].
//!
//! A run never rolls back. Every action is idempotent under the matching
//! rules, so a run that stopped half way can simply be repeated with the
//! same manifest.

use crate::config::DuplicateTypePolicy;
use crate::error::{OntologyError, OntologyResult};
use crate::matcher::{FuzzyReuseWarning, MatchResult, RelationMatcher};
use crate::plan::{PlanAction, RelationRef, ReconciliationPlan};
use crate::retry::ConvergenceRetrier;
use crate::serializer::WriteSerializer;
use penny_fleet::{BackendResult, SchemaBackend};
use penny_types::{
    BackendId, LiveSchemaSnapshot, LiveType, ProfileName, RelationId, RelationSpec,
    SchemaManifest, TypeId, TypeSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

// ── Run options ─────────────────────────────────────────────────

/// Per-call options for a reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsureOptions {
    /// Stop after planning; perform no writes.
    pub dry_run: bool,
}

/// Cooperative cancellation signal, checked between plan steps and during
/// convergence backoff.
///
/// A write already handed to the backend is never revoked; only the steps
/// after it are abandoned.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// ── Report ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Fetching,
    Diffing,
    Planning,
    Executing,
    Verifying,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Every planned write succeeded and is visible.
    Converged,
    /// Dry run: the plan was computed, nothing was written.
    Planned,
    /// Some steps failed; earlier writes stay in place.
    Partial,
    /// The caller cancelled the run between steps.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRelation {
    pub name: String,
    pub id: RelationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedType {
    pub name: String,
    pub id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReusedRelation {
    pub name: String,
    pub id: RelationId,
    pub matched_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy: Option<FuzzyReuseWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRelation {
    pub name: String,
    pub merged_into: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy: Option<FuzzyReuseWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReusedType {
    pub name: String,
    pub id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRelation {
    pub type_id: TypeId,
    pub type_name: String,
    pub relation_id: RelationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Skipped,
    UsedFirst,
}

/// A manifest type whose name matched several live types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConflict {
    pub type_name: String,
    pub existing_ids: Vec<TypeId>,
    pub resolution: ConflictResolution,
}

/// A plan step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Index into the plan; equal to the plan length for verification.
    pub step: usize,
    pub action: String,
    pub kind: String,
    pub error: String,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub backend: BackendId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileName>,
    pub space: String,
    pub dry_run: bool,
    pub plan: ReconciliationPlan,
    pub created_relations: Vec<CreatedRelation>,
    pub created_types: Vec<CreatedType>,
    pub reused_relations: Vec<ReusedRelation>,
    /// Manifest relations folded into a near-identical relation created by
    /// the same run.
    pub merged_relations: Vec<MergedRelation>,
    pub reused_types: Vec<ReusedType>,
    pub linked: Vec<LinkedRelation>,
    pub conflicts: Vec<TypeConflict>,
    pub failures: Vec<StepFailure>,
    /// Writes that completed successfully.
    pub writes: usize,
    pub phase: ReconcilePhase,
    pub outcome: ReconcileOutcome,
}

impl ReconciliationReport {
    fn new(backend: BackendId, space: String, dry_run: bool) -> Self {
        Self {
            backend,
            profile: None,
            space,
            dry_run,
            plan: ReconciliationPlan::default(),
            created_relations: Vec::new(),
            created_types: Vec::new(),
            reused_relations: Vec::new(),
            merged_relations: Vec::new(),
            reused_types: Vec::new(),
            linked: Vec::new(),
            conflicts: Vec::new(),
            failures: Vec::new(),
            writes: 0,
            phase: ReconcilePhase::Fetching,
            outcome: ReconcileOutcome::Converged,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.outcome == ReconcileOutcome::Converged
    }

    /// Fuzzy reuses and merges made during the run, for audit.
    pub fn fuzzy_warnings(&self) -> impl Iterator<Item = &FuzzyReuseWarning> {
        self.reused_relations
            .iter()
            .filter_map(|r| r.fuzzy.as_ref())
            .chain(self.merged_relations.iter().filter_map(|m| m.fuzzy.as_ref()))
    }

    fn enter(&mut self, next: ReconcilePhase) {
        debug!(backend = %self.backend, from = ?self.phase, to = ?next, "Reconciliation phase");
        self.phase = next;
    }
}

// ── Diff ────────────────────────────────────────────────────────

enum TypeDecision {
    Create(TypeSpec),
    Existing { spec: TypeSpec, live: LiveType },
    Skip,
}

struct SchemaDiff {
    relation_refs: HashMap<String, RelationRef>,
    pending_relations: Vec<RelationSpec>,
    types: Vec<TypeDecision>,
}

// ── Reconciler ──────────────────────────────────────────────────

/// Diffs manifests against live schema and drives the resulting plans.
pub struct OntologyReconciler {
    matcher: RelationMatcher,
    serializer: Arc<WriteSerializer>,
    retrier: ConvergenceRetrier,
    duplicate_types: DuplicateTypePolicy,
    /// One lock per `(backend, space)`; runs on the same space never overlap.
    space_locks: Mutex<HashMap<SpaceKey, Arc<Mutex<()>>>>,
}

type SpaceKey = (BackendId, String);

impl OntologyReconciler {
    pub fn new(serializer: Arc<WriteSerializer>, retrier: ConvergenceRetrier) -> Self {
        Self {
            matcher: RelationMatcher::default(),
            serializer,
            retrier,
            duplicate_types: DuplicateTypePolicy::default(),
            space_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_matcher(mut self, matcher: RelationMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicateTypePolicy) -> Self {
        self.duplicate_types = policy;
        self
    }

    pub fn serializer(&self) -> &Arc<WriteSerializer> {
        &self.serializer
    }

    pub fn retrier(&self) -> &ConvergenceRetrier {
        &self.retrier
    }

    /// Reconciles `manifest` against `backend`.
    ///
    /// Returns `Err` only when nothing was written: an invalid manifest, a
    /// failed initial fetch, or a duplicate type under
    /// [`DuplicateTypePolicy::Reject`]. Once execution starts, failures are
    /// recorded in the report instead.
    ///
    /// Runs against the same backend and space are serialized end to end,
    /// so a second run always diffs against the first run's writes.
    pub async fn reconcile(
        &self,
        manifest: &SchemaManifest,
        backend: &Arc<dyn SchemaBackend>,
        options: &EnsureOptions,
        cancel: &CancelToken,
    ) -> OntologyResult<ReconciliationReport> {
        manifest.validate()?;

        let key: SpaceKey = (
            backend.backend_id().clone(),
            manifest.space_target.trim().to_string(),
        );
        let lock = self.space_lock(&key).await;
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(manifest, backend, &key.1, options, cancel)
                .await
        };
        self.release_space_lock(&key, lock).await;
        result
    }

    async fn space_lock(&self, key: &SpaceKey) -> Arc<Mutex<()>> {
        let mut locks = self.space_locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    async fn release_space_lock(&self, key: &SpaceKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.space_locks.lock().await;
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    async fn reconcile_locked(
        &self,
        manifest: &SchemaManifest,
        backend: &Arc<dyn SchemaBackend>,
        space: &str,
        options: &EnsureOptions,
        cancel: &CancelToken,
    ) -> OntologyResult<ReconciliationReport> {
        let space = space.to_string();
        let mut report = ReconciliationReport::new(
            backend.backend_id().clone(),
            space.clone(),
            options.dry_run,
        );
        info!(
            backend = %report.backend,
            space = %space,
            manifest = manifest.label(),
            dry_run = options.dry_run,
            "Reconciling schema"
        );

        let snapshot = match backend.fetch_snapshot(&space).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                report.enter(ReconcilePhase::Failed);
                warn!(backend = %report.backend, error = %err, "Failed to fetch live schema");
                return Err(err.into());
            }
        };

        report.enter(ReconcilePhase::Diffing);
        let diff = match self.diff(manifest, &snapshot, &mut report) {
            Ok(diff) => diff,
            Err(err) => {
                report.enter(ReconcilePhase::Failed);
                return Err(err);
            }
        };

        report.enter(ReconcilePhase::Planning);
        report.plan = build_plan(&diff);
        debug!(
            backend = %report.backend,
            steps = report.plan.len(),
            plan = ?report.plan.labels(),
            "Plan built"
        );

        if options.dry_run {
            report.outcome = ReconcileOutcome::Planned;
            report.enter(ReconcilePhase::Done);
            return Ok(report);
        }

        report.enter(ReconcilePhase::Executing);
        let stopped = self
            .execute(backend, &space, &snapshot, &mut report, cancel)
            .await;

        if !stopped && report.writes > 0 {
            report.enter(ReconcilePhase::Verifying);
            if let Err(err) = self.verify(backend, &space, &report).await {
                report.failures.push(StepFailure {
                    step: report.plan.len(),
                    action: "verify".to_string(),
                    kind: err.kind().to_string(),
                    error: err.to_string(),
                });
            }
        }

        if report.outcome != ReconcileOutcome::Cancelled && !report.failures.is_empty() {
            report.outcome = ReconcileOutcome::Partial;
        }
        let terminal = match report.outcome {
            ReconcileOutcome::Converged | ReconcileOutcome::Planned => ReconcilePhase::Done,
            ReconcileOutcome::Partial | ReconcileOutcome::Cancelled => ReconcilePhase::Failed,
        };
        report.enter(terminal);

        info!(
            backend = %report.backend,
            outcome = ?report.outcome,
            writes = report.writes,
            created_relations = report.created_relations.len(),
            created_types = report.created_types.len(),
            reused_relations = report.reused_relations.len(),
            failures = report.failures.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }

    fn diff(
        &self,
        manifest: &SchemaManifest,
        snapshot: &LiveSchemaSnapshot,
        report: &mut ReconciliationReport,
    ) -> OntologyResult<SchemaDiff> {
        let mut relation_refs = HashMap::new();
        let mut pending_relations: Vec<RelationSpec> = Vec::new();

        for spec in manifest.unique_relations() {
            let key = spec.key();
            match self.matcher.match_name(&spec.name, &snapshot.relations) {
                MatchResult::Reused {
                    id,
                    matched_name,
                    fuzzy,
                } => {
                    if let Some(warning) = &fuzzy {
                        warn!(
                            desired = %warning.desired,
                            matched = %warning.matched,
                            distance = warning.distance,
                            "Reusing relation under a near-identical name"
                        );
                    }
                    report.reused_relations.push(ReusedRelation {
                        name: spec.name.trim().to_string(),
                        id: id.clone(),
                        matched_name,
                        fuzzy,
                    });
                    relation_refs.insert(key, RelationRef::Existing { id });
                }
                MatchResult::NotFound => {
                    let pending_names: Vec<&str> =
                        pending_relations.iter().map(|p| p.name.as_str()).collect();
                    match self.matcher.closest(&spec.name, &pending_names) {
                        Some((index, fuzzy)) => {
                            let target = &pending_relations[index];
                            if let Some(warning) = &fuzzy {
                                warn!(
                                    desired = %warning.desired,
                                    matched = %warning.matched,
                                    distance = warning.distance,
                                    "Merging near-identical relations of one manifest"
                                );
                            }
                            report.merged_relations.push(MergedRelation {
                                name: spec.name.trim().to_string(),
                                merged_into: target.name.trim().to_string(),
                                fuzzy,
                            });
                            relation_refs.insert(key, RelationRef::Pending { key: target.key() });
                        }
                        None => {
                            relation_refs.insert(key.clone(), RelationRef::Pending { key });
                            pending_relations.push(spec.clone());
                        }
                    }
                }
            }
        }

        let mut types = Vec::with_capacity(manifest.ensure_types.len());
        for spec in &manifest.ensure_types {
            let matches = snapshot.types_named(&spec.key());
            let decision = match matches.as_slice() {
                [] => TypeDecision::Create(spec.clone()),
                [live] => {
                    report.reused_types.push(ReusedType {
                        name: spec.name.trim().to_string(),
                        id: live.id.clone(),
                    });
                    TypeDecision::Existing {
                        spec: spec.clone(),
                        live: (*live).clone(),
                    }
                }
                [first, ..] => {
                    let existing_ids: Vec<TypeId> = matches.iter().map(|t| t.id.clone()).collect();
                    warn!(
                        type_name = %spec.name,
                        count = existing_ids.len(),
                        policy = ?self.duplicate_types,
                        "Type name matches several live types"
                    );
                    match self.duplicate_types {
                        DuplicateTypePolicy::Reject => {
                            return Err(OntologyError::RelationConflict {
                                type_name: spec.name.trim().to_string(),
                                existing_ids,
                            });
                        }
                        DuplicateTypePolicy::Report => {
                            report.conflicts.push(TypeConflict {
                                type_name: spec.name.trim().to_string(),
                                existing_ids,
                                resolution: ConflictResolution::Skipped,
                            });
                            TypeDecision::Skip
                        }
                        DuplicateTypePolicy::UseFirst => {
                            report.conflicts.push(TypeConflict {
                                type_name: spec.name.trim().to_string(),
                                existing_ids,
                                resolution: ConflictResolution::UsedFirst,
                            });
                            report.reused_types.push(ReusedType {
                                name: spec.name.trim().to_string(),
                                id: first.id.clone(),
                            });
                            TypeDecision::Existing {
                                spec: spec.clone(),
                                live: (*first).clone(),
                            }
                        }
                    }
                }
            };
            types.push(decision);
        }

        Ok(SchemaDiff {
            relation_refs,
            pending_relations,
            types,
        })
    }

    /// Runs the plan in order. Returns true when the run stopped early.
    async fn execute(
        &self,
        backend: &Arc<dyn SchemaBackend>,
        space: &str,
        snapshot: &LiveSchemaSnapshot,
        report: &mut ReconciliationReport,
        cancel: &CancelToken,
    ) -> bool {
        let mut created: HashMap<String, RelationId> = HashMap::new();
        let mut type_relations: HashMap<TypeId, Vec<RelationId>> = snapshot
            .types
            .iter()
            .filter_map(|t| t.relation_ids.clone().map(|ids| (t.id.clone(), ids)))
            .collect();

        let actions = report.plan.actions.clone();
        for (step, action) in actions.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(backend = %report.backend, step, "Reconciliation cancelled");
                report.outcome = ReconcileOutcome::Cancelled;
                abandon(report, &actions, step, "cancelled", "cancelled before dispatch");
                return true;
            }

            let result = match action {
                PlanAction::CreateRelation { spec } => {
                    let (name, key) = (spec.name.trim().to_string(), spec.key());
                    let write = {
                        let backend = Arc::clone(backend);
                        let (space, spec) = (space.to_string(), spec.clone());
                        async move {
                            backend
                                .create_relation(&space, &spec)
                                .await
                                .map_err(OntologyError::from)
                        }
                    };
                    self.serializer
                        .submit(backend.backend_id(), action.operation(), write)
                        .await
                        .map(|id| {
                            created.insert(key, id.clone());
                            report.created_relations.push(CreatedRelation { name, id });
                        })
                }
                PlanAction::CreateType { spec, relations } => {
                    match resolve_all(relations, &created) {
                        Ok(ids) => {
                            let (space, owned) = (space.to_string(), spec.clone());
                            let make = move |backend: Arc<dyn SchemaBackend>| {
                                let (space, spec, ids) =
                                    (space.clone(), owned.clone(), ids.clone());
                                async move { backend.create_type(&space, &spec, &ids).await }
                            };
                            self.dispatch(backend, action.operation(), cancel, make)
                                .await
                                .map(|id| {
                                    report.created_types.push(CreatedType {
                                        name: spec.name.trim().to_string(),
                                        id,
                                    });
                                })
                        }
                        Err(err) => Err(err),
                    }
                }
                PlanAction::LinkTypeRelation {
                    type_id,
                    type_name,
                    relation,
                } => match resolve(relation, &created) {
                    Ok(relation_id) => {
                        let mut next = type_relations.get(type_id).cloned().unwrap_or_default();
                        if !next.contains(&relation_id) {
                            next.push(relation_id.clone());
                        }
                        let (space, target, full) =
                            (space.to_string(), type_id.clone(), next.clone());
                        let make = move |backend: Arc<dyn SchemaBackend>| {
                            let (space, target, full) =
                                (space.clone(), target.clone(), full.clone());
                            async move { backend.set_type_relations(&space, &target, &full).await }
                        };
                        self.dispatch(backend, action.operation(), cancel, make)
                            .await
                            .map(|()| {
                                type_relations.insert(type_id.clone(), next);
                                report.linked.push(LinkedRelation {
                                    type_id: type_id.clone(),
                                    type_name: type_name.clone(),
                                    relation_id,
                                });
                            })
                    }
                    Err(err) => Err(err),
                },
            };

            match result {
                Ok(()) => report.writes += 1,
                Err(OntologyError::Cancelled) if cancel.is_cancelled() => {
                    info!(backend = %report.backend, step, "Reconciliation cancelled");
                    report.outcome = ReconcileOutcome::Cancelled;
                    abandon(report, &actions, step, "cancelled", "cancelled during retry");
                    return true;
                }
                Err(err) => {
                    warn!(
                        backend = %report.backend,
                        step,
                        action = %action.label(),
                        error = %err,
                        "Plan step failed"
                    );
                    report.failures.push(StepFailure {
                        step,
                        action: action.label(),
                        kind: err.kind().to_string(),
                        error: err.to_string(),
                    });
                    let reason = format!("not attempted after step {step} failed");
                    abandon(report, &actions, step + 1, "skipped", &reason);
                    return true;
                }
            }
        }
        false
    }

    /// Re-reads the schema until every created entity is listed.
    async fn verify(
        &self,
        backend: &Arc<dyn SchemaBackend>,
        space: &str,
        report: &ReconciliationReport,
    ) -> OntologyResult<()> {
        let expected_relations: Vec<&RelationId> =
            report.created_relations.iter().map(|r| &r.id).collect();
        let expected_types: Vec<&TypeId> = report.created_types.iter().map(|t| &t.id).collect();
        let expected_links: Vec<&LinkedRelation> = report.linked.iter().collect();
        let (relations, types, links) = (&expected_relations, &expected_types, &expected_links);

        self.retrier
            .retry_lag("verify", move || async move {
                let snapshot = backend.fetch_snapshot(space).await?;
                let mut missing: Vec<String> = Vec::new();
                missing.extend(
                    relations
                        .iter()
                        .filter(|id| !snapshot.has_relation(id))
                        .map(|id| format!("relation {id}")),
                );
                missing.extend(
                    types
                        .iter()
                        .filter(|id| !snapshot.has_type(id))
                        .map(|id| format!("type {id}")),
                );
                missing.extend(
                    links
                        .iter()
                        .filter(|link| !link_visible(&snapshot, link))
                        .map(|link| format!("link {} -> {}", link.type_id, link.relation_id)),
                );
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(OntologyError::EntityNotYetVisible(format!(
                        "not listed yet: {}",
                        missing.join(", ")
                    )))
                }
            })
            .await
    }

    /// Runs one backend write through the serializer, retrying on index lag
    /// until `cancel` fires.
    pub(crate) async fn dispatch<T, F, Fut>(
        &self,
        backend: &Arc<dyn SchemaBackend>,
        operation: &'static str,
        cancel: &CancelToken,
        make: F,
    ) -> OntologyResult<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn SchemaBackend>) -> Fut + Sync,
        Fut: Future<Output = BackendResult<T>> + Send + 'static,
    {
        let serializer = &self.serializer;
        let make = &make;
        self.retrier
            .retry_until_cancelled(
                operation,
                move || {
                    let write = make(Arc::clone(backend));
                    async move {
                        serializer
                            .submit(backend.backend_id(), operation, async move {
                                write.await.map_err(OntologyError::from)
                            })
                            .await
                    }
                },
                OntologyError::is_transient_lag,
                cancel,
            )
            .await
    }
}

fn resolve(
    relation: &RelationRef,
    created: &HashMap<String, RelationId>,
) -> OntologyResult<RelationId> {
    match relation {
        RelationRef::Existing { id } => Ok(id.clone()),
        RelationRef::Pending { key } => created
            .get(key)
            .cloned()
            .ok_or_else(|| OntologyError::Protocol(format!("relation '{key}' was never created"))),
    }
}

fn resolve_all(
    relations: &[RelationRef],
    created: &HashMap<String, RelationId>,
) -> OntologyResult<Vec<RelationId>> {
    relations.iter().map(|r| resolve(r, created)).collect()
}

fn link_visible(snapshot: &LiveSchemaSnapshot, link: &LinkedRelation) -> bool {
    match snapshot.type_by_id(&link.type_id) {
        Some(live) => live
            .relation_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&link.relation_id)),
        None => false,
    }
}

fn abandon(
    report: &mut ReconciliationReport,
    actions: &[PlanAction],
    from: usize,
    kind: &str,
    reason: &str,
) {
    for (step, action) in actions.iter().enumerate().skip(from) {
        report.failures.push(StepFailure {
            step,
            action: action.label(),
            kind: kind.to_string(),
            error: reason.to_string(),
        });
    }
}

/// Orders the diff into a plan: relation creations first, then per type
/// either its creation or the links it is missing.
fn build_plan(diff: &SchemaDiff) -> ReconciliationPlan {
    let mut actions: Vec<PlanAction> = diff
        .pending_relations
        .iter()
        .map(|spec| PlanAction::CreateRelation { spec: spec.clone() })
        .collect();

    for decision in &diff.types {
        match decision {
            TypeDecision::Create(spec) => actions.push(PlanAction::CreateType {
                spec: spec.clone(),
                relations: type_refs(spec, &diff.relation_refs),
            }),
            TypeDecision::Existing { spec, live } => {
                let Some(current) = &live.relation_ids else {
                    continue;
                };
                let current: HashSet<&RelationId> = current.iter().collect();
                for relation in type_refs(spec, &diff.relation_refs) {
                    if let RelationRef::Existing { id } = &relation {
                        if current.contains(id) {
                            continue;
                        }
                    }
                    actions.push(PlanAction::LinkTypeRelation {
                        type_id: live.id.clone(),
                        type_name: spec.name.trim().to_string(),
                        relation,
                    });
                }
            }
            TypeDecision::Skip => {}
        }
    }

    ReconciliationPlan { actions }
}

/// The type's relation references, each target once.
fn type_refs(spec: &TypeSpec, refs: &HashMap<String, RelationRef>) -> Vec<RelationRef> {
    let mut seen = HashSet::new();
    spec.relations
        .iter()
        .filter_map(|r| refs.get(&r.key()).cloned())
        .filter(|relation| seen.insert(relation.clone()))
        .collect()
}
