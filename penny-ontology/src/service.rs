//! The engine facade exposed to the agent layer.

use crate::config::EngineConfig;
use crate::error::OntologyResult;
use crate::reconciler::{CancelToken, EnsureOptions, OntologyReconciler, ReconciliationReport};
use crate::retry::ConvergenceRetrier;
use crate::serializer::WriteSerializer;
use penny_fleet::{
    HealthState, NewObject, NewSpace, ProfileRouter, ProfileSwitch, SearchQuery, Session,
};
use penny_types::{
    GraphStats, MAX_NAME_LEN, ObjectId, ObjectSummary, ProfileName, SchemaManifest, Space,
    ValidationError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Routes every operation to the session's backend and owns the shared
/// write serializer.
pub struct KnowledgeCore {
    router: Arc<ProfileRouter>,
    reconciler: OntologyReconciler,
    drain_timeout: Duration,
}

impl KnowledgeCore {
    pub fn new(router: Arc<ProfileRouter>, config: &EngineConfig) -> Self {
        let serializer = Arc::new(WriteSerializer::new(
            config.write_delay(),
            config.max_queue_depth,
        ));
        let retrier = ConvergenceRetrier::new(config.retry_policy());
        let reconciler = OntologyReconciler::new(serializer, retrier)
            .with_duplicate_policy(config.duplicate_types);
        Self {
            router,
            reconciler,
            drain_timeout: config.drain_timeout(),
        }
    }

    pub fn router(&self) -> &Arc<ProfileRouter> {
        &self.router
    }

    pub fn reconciler(&self) -> &OntologyReconciler {
        &self.reconciler
    }

    pub fn new_session(&self) -> Session {
        self.router.new_session()
    }

    /// Reconciles `manifest` against the backend of `profile`, or of the
    /// session's active profile.
    pub async fn ensure_schema(
        &self,
        session: &Session,
        manifest: &SchemaManifest,
        profile: Option<&str>,
        options: &EnsureOptions,
        cancel: &CancelToken,
    ) -> OntologyResult<ReconciliationReport> {
        let route = self.router.resolve(session, profile).await?;
        let mut report = self
            .reconciler
            .reconcile(manifest, &route.backend, options, cancel)
            .await?;
        report.profile = Some(route.profile);
        Ok(report)
    }

    pub async fn switch_profile(
        &self,
        session: &mut Session,
        profile: &str,
    ) -> OntologyResult<ProfileSwitch> {
        Ok(self.router.switch_profile(session, profile).await?)
    }

    /// Creates an object, queued behind other writes to the same backend and
    /// retried while its type is not yet visible.
    pub async fn create_object(
        &self,
        session: &Session,
        object: NewObject,
        profile: Option<&str>,
    ) -> OntologyResult<ObjectId> {
        let route = self.router.resolve(session, profile).await?;
        let object = Arc::new(object);
        let id = self
            .reconciler
            .dispatch(
                &route.backend,
                "create_object",
                &CancelToken::new(),
                move |backend| {
                    let object = Arc::clone(&object);
                    async move { backend.create_object(&object).await }
                },
            )
            .await?;
        info!(profile = %route.profile, %id, "Created object");
        Ok(id)
    }

    /// Creates a space on the resolved backend. The write is queued behind
    /// any schema writes to the same backend.
    pub async fn create_space(
        &self,
        session: &Session,
        space: NewSpace,
        profile: Option<&str>,
    ) -> OntologyResult<(ProfileName, Space)> {
        let name = space.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "must not be blank").into());
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::new(
                "name",
                format!("longer than {MAX_NAME_LEN} characters"),
            )
            .into());
        }
        let route = self.router.resolve(session, profile).await?;
        let space = Arc::new(NewSpace {
            name: name.to_string(),
            ..space
        });
        let created = self
            .reconciler
            .dispatch(
                &route.backend,
                "create_space",
                &CancelToken::new(),
                move |backend| {
                    let space = Arc::clone(&space);
                    async move { backend.create_space(&space).await }
                },
            )
            .await?;
        info!(profile = %route.profile, space = %created.id, "Created space");
        Ok((route.profile, created))
    }

    pub async fn list_spaces(
        &self,
        session: &Session,
        profile: Option<&str>,
    ) -> OntologyResult<(ProfileName, Vec<Space>)> {
        let route = self.router.resolve(session, profile).await?;
        let spaces = route.backend.list_spaces().await?;
        debug!(profile = %route.profile, spaces = spaces.len(), "Listed spaces");
        Ok((route.profile, spaces))
    }

    pub async fn graph_stats(
        &self,
        session: &Session,
        profile: Option<&str>,
    ) -> OntologyResult<(ProfileName, GraphStats)> {
        let route = self.router.resolve(session, profile).await?;
        let stats = route.backend.graph_stats().await?;
        Ok((route.profile, stats))
    }

    pub async fn search_graph(
        &self,
        session: &Session,
        query: &SearchQuery,
        profile: Option<&str>,
    ) -> OntologyResult<Vec<ObjectSummary>> {
        let route = self.router.resolve(session, profile).await?;
        let results = route.backend.search(query).await?;
        debug!(profile = %route.profile, results = results.len(), "Search completed");
        Ok(results)
    }

    pub async fn fleet_health(
        &self,
        profile: Option<&str>,
    ) -> OntologyResult<BTreeMap<ProfileName, HealthState>> {
        Ok(self.router.health(profile).await?)
    }

    /// Drains queued writes within the configured timeout. Returns false
    /// when writes had to be cancelled.
    pub async fn shutdown(&self) -> bool {
        self.reconciler.serializer().shutdown(self.drain_timeout).await
    }
}
