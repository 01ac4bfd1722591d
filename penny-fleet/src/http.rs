//! HTTP implementation of [`SchemaBackend`].
//!
//! Talks to an identity node's JSON API with a bearer token. A `401` triggers
//! one token refresh followed by a single retry of the same call.

use crate::backend::{HealthState, NewObject, NewSpace, SchemaBackend, SearchQuery};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use penny_types::{
    BackendId, GraphStats, LiveRelation, LiveType, ObjectId, ObjectSummary, RelationId,
    RelationSpec, Space, TypeId, TypeSpec,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Error code a backend puts in a 4xx body when a referenced entity has not
/// propagated yet.
pub const NOT_YET_VISIBLE_CODE: &str = "entity_not_yet_visible";

/// Connection settings for one backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct HttpBackendConfig {
    /// Base URL of the node's API (e.g. `http://heart-personal:31009`).
    pub base_url: String,
    /// Bearer token presented on every call.
    pub token: Option<String>,
    /// Secret exchanged for a fresh token when the current one is refused.
    pub refresh_secret: Option<String>,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            refresh_secret: None,
            timeout_ms: 30_000,
        }
    }
}

impl fmt::Debug for HttpBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackendConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_secret",
                &self.refresh_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
}

#[derive(Serialize)]
struct CreateRelationBody<'a> {
    name: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    space_id: &'a str,
}

#[derive(Serialize)]
struct CreateTypeBody<'a> {
    name: &'a str,
    relation_ids: &'a [RelationId],
    layout: penny_types::Layout,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    space_id: &'a str,
}

#[derive(Serialize)]
struct SetRelationsBody<'a> {
    relation_ids: &'a [RelationId],
    space_id: &'a str,
}

/// Backend reached over HTTP.
pub struct HttpBackend {
    id: BackendId,
    base_url: String,
    client: Client,
    token: Arc<RwLock<Option<String>>>,
    refresh_secret: Option<String>,
}

impl HttpBackend {
    /// Creates a client for the configured backend.
    pub fn new(config: HttpBackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::Protocol(format!("failed to create HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            id: BackendId::from_base_url(&base_url),
            base_url,
            client,
            token: Arc::new(RwLock::new(config.token)),
            refresh_secret: config.refresh_secret,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replaces the bearer token (e.g. after an out-of-band login).
    pub async fn set_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    /// Exchanges the refresh secret for a new bearer token.
    async fn refresh_token(&self) -> BackendResult<()> {
        let secret = self.refresh_secret.as_ref().ok_or_else(|| {
            BackendError::AuthExpired(format!("{}: token refused, no refresh secret", self.id))
        })?;

        debug!(backend = %self.id, "Refreshing backend token");

        let response = self
            .client
            .post(format!("{}/v1/auth/token", self.base_url))
            .json(&serde_json::json!({ "refresh_secret": secret }))
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BackendError::AuthExpired(format!(
                "{}: token refresh refused ({status})",
                self.id
            )));
        }

        let refreshed: TokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("failed to parse token response: {e}")))?;

        *self.token.write().await = Some(refreshed.token);
        info!(backend = %self.id, "Backend token refreshed");
        Ok(())
    }

    /// Sends a request, re-authenticating once on `401`.
    async fn send<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> BackendResult<Response> {
        let mut reauthenticated = false;
        loop {
            let token = self.token.read().await.clone();
            let mut request = self
                .client
                .request(method.clone(), format!("{}{path}", self.base_url))
                .query(query);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(backend = %self.id, %method, path, "Backend request");

            let response = request
                .send()
                .await
                .map_err(|e| BackendError::Unreachable(format!("{method} {path}: {e}")))?;

            if response.status() == StatusCode::UNAUTHORIZED {
                if reauthenticated {
                    return Err(BackendError::AuthExpired(format!(
                        "{}: {method} {path} refused after token refresh",
                        self.id
                    )));
                }
                warn!(backend = %self.id, %method, path, "Token refused, re-authenticating");
                self.refresh_token().await?;
                reauthenticated = true;
                continue;
            }

            return check_status(&method, path, response).await;
        }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        key: &str,
    ) -> BackendResult<Vec<T>> {
        let response = self.send::<()>(Method::GET, path, query, None).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("GET {path}: {e}")))?;
        parse_list(value, key)
    }

    async fn post_created<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<String> {
        let response = self.send(Method::POST, path, &[], Some(body)).await?;
        let created: Created = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("POST {path}: {e}")))?;
        Ok(created.id)
    }
}

/// Maps a non-success status onto the error taxonomy.
async fn check_status(method: &Method, path: &str, response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let code = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.code);
    let is_write = *method != Method::GET;

    let not_visible = code.as_deref() == Some(NOT_YET_VISIBLE_CODE)
        || (is_write && status == StatusCode::NOT_FOUND);
    if not_visible {
        return Err(BackendError::NotYetVisible(format!("{method} {path}: {body}")));
    }
    if status.is_server_error() {
        return Err(BackendError::Unreachable(format!(
            "{method} {path}: server error {status}"
        )));
    }
    Err(BackendError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Accepts either a bare JSON array or an object wrapping it under `key`.
fn parse_list<T: DeserializeOwned>(value: serde_json::Value, key: &str) -> BackendResult<Vec<T>> {
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(mut map) => match map.remove(key) {
            Some(list) => Ok(serde_json::from_value(list)?),
            None => Err(BackendError::Protocol(format!(
                "expected an array or an object with '{key}'"
            ))),
        },
        other => Err(BackendError::Protocol(format!(
            "expected an array, got {other}"
        ))),
    }
}

#[async_trait]
impl SchemaBackend for HttpBackend {
    fn backend_id(&self) -> &BackendId {
        &self.id
    }

    async fn list_types(&self, space: &str) -> BackendResult<Vec<LiveType>> {
        self.get_list("/v1/types", &[("space_id", space.to_string())], "types")
            .await
    }

    async fn list_relations(&self, space: &str) -> BackendResult<Vec<LiveRelation>> {
        self.get_list("/v1/relations", &[("space_id", space.to_string())], "relations")
            .await
    }

    async fn create_relation(
        &self,
        space: &str,
        spec: &RelationSpec,
    ) -> BackendResult<RelationId> {
        let body = CreateRelationBody {
            name: spec.name.trim(),
            format: spec.format.as_str(),
            description: spec.description.as_deref(),
            space_id: space,
        };
        let id = self.post_created("/v1/relations", &body).await?;
        info!(backend = %self.id, relation = %spec.name, %id, "Created relation");
        Ok(RelationId::new(id))
    }

    async fn create_type(
        &self,
        space: &str,
        spec: &TypeSpec,
        relation_ids: &[RelationId],
    ) -> BackendResult<TypeId> {
        let body = CreateTypeBody {
            name: spec.name.trim(),
            relation_ids,
            layout: spec.layout,
            description: spec.description.as_deref(),
            icon: spec.icon.as_deref(),
            space_id: space,
        };
        let id = self.post_created("/v1/types", &body).await?;
        info!(backend = %self.id, type_name = %spec.name, %id, "Created type");
        Ok(TypeId::new(id))
    }

    async fn set_type_relations(
        &self,
        space: &str,
        type_id: &TypeId,
        relation_ids: &[RelationId],
    ) -> BackendResult<()> {
        let body = SetRelationsBody {
            relation_ids,
            space_id: space,
        };
        self.send(Method::PUT, &format!("/v1/types/{type_id}"), &[], Some(&body))
            .await?;
        Ok(())
    }

    async fn create_object(&self, object: &NewObject) -> BackendResult<ObjectId> {
        let id = self.post_created("/v1/objects", object).await?;
        Ok(ObjectId::new(id))
    }

    async fn search(&self, query: &SearchQuery) -> BackendResult<Vec<ObjectSummary>> {
        let mut params = vec![
            ("query", query.query.clone()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(type_id) = &query.type_id {
            params.push(("type_id", type_id.to_string()));
        }
        if let Some(space) = &query.space_id {
            params.push(("space_id", space.clone()));
        }
        self.get_list("/v1/search", &params, "objects").await
    }

    async fn create_space(&self, space: &NewSpace) -> BackendResult<Space> {
        let response = self
            .send(Method::POST, "/v1/spaces", &[], Some(space))
            .await?;
        let created: Space = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("POST /v1/spaces: {e}")))?;
        info!(backend = %self.id, space = %created.id, name = %created.name, "Created space");
        Ok(created)
    }

    async fn list_spaces(&self) -> BackendResult<Vec<Space>> {
        self.get_list("/v1/spaces", &[], "spaces").await
    }

    async fn graph_stats(&self) -> BackendResult<GraphStats> {
        let response = self.send::<()>(Method::GET, "/v1/stats", &[], None).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("GET /v1/stats: {e}")))
    }

    async fn health(&self) -> HealthState {
        match self.send::<()>(Method::GET, "/v1/health", &[], None).await {
            Ok(_) => HealthState::Healthy,
            Err(e) => HealthState::Unhealthy {
                reason: e.to_string(),
            },
        }
    }
}
