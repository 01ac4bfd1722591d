//! Reconciliation plans.

use penny_types::{RelationId, RelationSpec, TypeId, TypeSpec};
use serde::Serialize;
use std::collections::HashSet;

/// A relation a planned action depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelationRef {
    /// Already live under this id.
    Existing { id: RelationId },
    /// Created by an earlier `CreateRelation` action, by normalized key.
    Pending { key: String },
}

/// One write the reconciler will perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    CreateRelation {
        spec: RelationSpec,
    },
    CreateType {
        spec: TypeSpec,
        relations: Vec<RelationRef>,
    },
    LinkTypeRelation {
        type_id: TypeId,
        type_name: String,
        relation: RelationRef,
    },
}

impl PlanAction {
    /// Short human-readable label, e.g. `create_relation(Status)`.
    pub fn label(&self) -> String {
        match self {
            PlanAction::CreateRelation { spec } => format!("create_relation({})", spec.name.trim()),
            PlanAction::CreateType { spec, .. } => format!("create_type({})", spec.name.trim()),
            PlanAction::LinkTypeRelation {
                type_name, relation, ..
            } => {
                let target = match relation {
                    RelationRef::Existing { id } => id.to_string(),
                    RelationRef::Pending { key } => key.clone(),
                };
                format!("link_type_relation({type_name}, {target})")
            }
        }
    }

    /// Backend operation name used for the write ticket.
    pub fn operation(&self) -> &'static str {
        match self {
            PlanAction::CreateRelation { .. } => "create_relation",
            PlanAction::CreateType { .. } => "create_type",
            PlanAction::LinkTypeRelation { .. } => "link_type_relation",
        }
    }

    fn dependencies(&self) -> Vec<&RelationRef> {
        match self {
            PlanAction::CreateRelation { .. } => Vec::new(),
            PlanAction::CreateType { relations, .. } => relations.iter().collect(),
            PlanAction::LinkTypeRelation { relation, .. } => vec![relation],
        }
    }
}

/// Ordered list of writes bringing a space in line with a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub actions: Vec<PlanAction>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.actions.iter().map(PlanAction::label).collect()
    }

    /// True when every pending relation is created before any action that
    /// references it.
    pub fn is_ordered(&self) -> bool {
        let mut created: HashSet<String> = HashSet::new();
        for action in &self.actions {
            let unresolved = action.dependencies().into_iter().any(|dependency| {
                matches!(dependency, RelationRef::Pending { key } if !created.contains(key))
            });
            if unresolved {
                return false;
            }
            if let PlanAction::CreateRelation { spec } = action {
                created.insert(spec.key());
            }
        }
        true
    }
}
