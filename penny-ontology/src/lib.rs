//! Ontology reconciliation engine.
//!
//! Keeps the schema of each identity node in line with declarative
//! manifests:
//!
//! - **Matcher**: decides reuse vs. create for relation names
//! - **Serializer**: one FIFO write queue per backend
//! - **Retrier**: bounded backoff over index-propagation lag
//! - **Reconciler**: fetch, diff, plan, execute, verify
//! - **Service**: [`KnowledgeCore`], the routed operations the agent calls
//!
//! # Example
//!
//! ```no_run
//! use penny_fleet::{FleetConfig, ProfileRouter};
//! use penny_ontology::{CancelToken, EngineConfig, EnsureOptions, KnowledgeCore};
//! use penny_types::{RelationFormat, SchemaManifest, TypeSpec};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Arc::new(ProfileRouter::from_config(&FleetConfig::default())?);
//! let core = KnowledgeCore::new(router, &EngineConfig::default());
//! let session = core.new_session();
//!
//! let manifest = SchemaManifest::new("space_1").with_type(
//!     TypeSpec::new("Project")
//!         .with_relation("Status", RelationFormat::Status)
//!         .with_relation("Due Date", RelationFormat::Date),
//! );
//! let report = core
//!     .ensure_schema(&session, &manifest, None, &EnsureOptions::default(), &CancelToken::new())
//!     .await?;
//! println!("{} writes", report.writes);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod matcher;
pub mod plan;
pub mod reconciler;
pub mod retry;
pub mod serializer;
mod service;

pub use config::{DuplicateTypePolicy, EngineConfig};
pub use error::{OntologyError, OntologyResult};
pub use matcher::{FuzzyReuseWarning, MatchResult, RelationMatcher, levenshtein_with_max};
pub use plan::{PlanAction, ReconciliationPlan, RelationRef};
pub use reconciler::{
    CancelToken, ConflictResolution, CreatedRelation, CreatedType, EnsureOptions, LinkedRelation,
    OntologyReconciler, ReconcileOutcome, ReconcilePhase, ReconciliationReport, ReusedRelation,
    ReusedType, StepFailure, TypeConflict,
};
pub use retry::{ConvergenceRetrier, RetryPolicy};
pub use serializer::{WriteSerializer, WriteTicket};
pub use service::KnowledgeCore;
