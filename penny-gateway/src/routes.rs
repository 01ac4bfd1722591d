//! Request handlers.

use crate::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use penny_fleet::{
    DEFAULT_SEARCH_LIMIT, HealthState, NewObject, NewSpace, ProfileSwitch, SearchQuery,
};
use penny_ontology::{CancelToken, EnsureOptions, OntologyError, ReconciliationReport};
use penny_types::{
    GraphStats, ObjectId, ObjectSummary, ProfileName, SchemaManifest, Space, TypeId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Header naming the caller's session. Requests without it share one
/// gateway-wide session.
pub const SESSION_HEADER: &str = "x-session-id";

type ApiResult<T> = Result<Json<T>, ApiError>;

fn session_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub default_profile: ProfileName,
    pub active_profile: ProfileName,
    pub backends: BTreeMap<ProfileName, HealthState>,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusResponse> {
    let session = state.session(session_key(&headers)).await;
    let backends = state.core.fleet_health(None).await?;
    Ok(Json(StatusResponse {
        default_profile: state.core.router().default_profile().clone(),
        active_profile: session.active_profile,
        backends,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub profile_name: String,
}

pub async fn switch_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SwitchRequest>,
) -> ApiResult<ProfileSwitch> {
    let switch = state
        .switch_profile(session_key(&headers), &req.profile_name)
        .await?;
    Ok(Json(switch))
}

#[derive(Debug, Deserialize)]
pub struct EnsureRequest {
    /// Loosely-shaped manifest; validated before anything is fetched.
    pub manifest: serde_json::Value,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn ensure_ontology(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EnsureRequest>,
) -> ApiResult<ReconciliationReport> {
    let manifest = SchemaManifest::from_json(req.manifest).map_err(OntologyError::from)?;
    let session = state.session(session_key(&headers)).await;
    let options = EnsureOptions {
        dry_run: req.dry_run,
    };
    let report = state
        .core
        .ensure_schema(
            &session,
            &manifest,
            req.profile_name.as_deref(),
            &options,
            &CancelToken::new(),
        )
        .await?;
    info!(
        space = %report.space,
        writes = report.writes,
        outcome = ?report.outcome,
        "Ontology ensured"
    );
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CreateObjectRequest {
    pub type_id: TypeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateObjectResponse {
    pub id: ObjectId,
}

pub async fn create_object(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateObjectRequest>,
) -> ApiResult<CreateObjectResponse> {
    let session = state.session(session_key(&headers)).await;
    let object = NewObject {
        type_id: req.type_id,
        name: req.name,
        fields: req.fields,
        space_id: req.space_id,
    };
    let id = state
        .core
        .create_object(&session, object, req.profile_name.as_deref())
        .await?;
    Ok(Json(CreateObjectResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub type_filter: Option<TypeId>,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub objects: Vec<ObjectSummary>,
    pub total: usize,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let session = state.session(session_key(&headers)).await;
    let mut query =
        SearchQuery::new(req.query).with_limit(req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
    query.type_id = req.type_filter;
    query.space_id = req.space_id;

    let objects = state
        .core
        .search_graph(&session, &query, req.profile_name.as_deref())
        .await?;
    Ok(Json(SearchResponse {
        total: objects.len(),
        objects,
    }))
}

/// Optional profile override carried in the query string of read routes.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileParams {
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSpaceResponse {
    pub space: Space,
    pub profile: ProfileName,
    pub message: String,
}

pub async fn create_space(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSpaceRequest>,
) -> ApiResult<CreateSpaceResponse> {
    let session = state.session(session_key(&headers)).await;
    let request = NewSpace {
        name: req.name,
        icon: req.icon,
    };
    let (profile, space) = state
        .core
        .create_space(&session, request, req.profile_name.as_deref())
        .await?;
    let message = format!("Created space '{}' with ID {}", space.name, space.id);
    Ok(Json(CreateSpaceResponse {
        space,
        profile,
        message,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpacesResponse {
    pub spaces: Vec<Space>,
    pub profile: ProfileName,
}

pub async fn list_spaces(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ProfileParams>,
) -> ApiResult<SpacesResponse> {
    let session = state.session(session_key(&headers)).await;
    let (profile, spaces) = state
        .core
        .list_spaces(&session, params.profile_name.as_deref())
        .await?;
    Ok(Json(SpacesResponse { spaces, profile }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: GraphStats,
    pub profile: ProfileName,
}

pub async fn graph_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ProfileParams>,
) -> ApiResult<StatsResponse> {
    let session = state.session(session_key(&headers)).await;
    let (profile, stats) = state
        .core
        .graph_stats(&session, params.profile_name.as_deref())
        .await?;
    Ok(Json(StatsResponse { stats, profile }))
}
