//! HTTP API for the PENNY knowledge core.
//!
//! Exposes profile switching, ontology reconciliation, object creation and
//! search to the agent layer. Callers identify their session with the
//! `x-session-id` header; each session carries its own active profile.
//! Sessions idle for longer than the configured TTL are forgotten, and the
//! least recently seen one is evicted once the table is full.

mod config;
mod error;
pub mod routes;

pub use config::{
    ConfigError, DEFAULT_BIND, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE_SECS, GatewayConfig,
};
pub use error::{ApiError, ErrorBody};
pub use routes::SESSION_HEADER;

use axum::Router;
use axum::routing::{get, post};
use penny_fleet::{ProfileSwitch, Session};
use penny_ontology::{KnowledgeCore, OntologyResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Key of the session shared by requests without a session header.
const SHARED_SESSION: &str = "";

struct SessionEntry {
    session: Session,
    last_seen: Instant,
}

/// State shared by all handlers.
pub struct AppState {
    pub core: KnowledgeCore,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl AppState {
    pub fn new(core: KnowledgeCore) -> Self {
        Self {
            core,
            sessions: Mutex::new(HashMap::new()),
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }

    /// Caps the session table at `max_sessions` entries (at least one) and
    /// forgets sessions unseen for `idle_ttl`.
    pub fn with_session_limits(mut self, max_sessions: usize, idle_ttl: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.idle_ttl = idle_ttl;
        self
    }

    /// Returns a copy of the named session, or a fresh one on the default
    /// profile if the caller has not switched yet or the session expired.
    pub async fn session(&self, key: Option<&str>) -> Session {
        let key = key.unwrap_or(SHARED_SESSION);
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(key) {
            if now.duration_since(entry.last_seen) < self.idle_ttl {
                entry.last_seen = now;
                return entry.session.clone();
            }
            sessions.remove(key);
            debug!(session = key, "Session expired");
        }
        self.core.new_session()
    }

    /// Switches the named session's active profile. An unknown profile
    /// leaves the session untouched.
    pub async fn switch_profile(
        &self,
        key: Option<&str>,
        profile: &str,
    ) -> OntologyResult<ProfileSwitch> {
        let key = key.unwrap_or(SHARED_SESSION);
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let mut session = sessions
            .get(key)
            .filter(|entry| now.duration_since(entry.last_seen) < self.idle_ttl)
            .map(|entry| entry.session.clone())
            .unwrap_or_else(|| self.core.new_session());
        let switch = self.core.switch_profile(&mut session, profile).await?;
        if !sessions.contains_key(key) {
            self.make_room(&mut sessions, now);
        }
        sessions.insert(
            key.to_string(),
            SessionEntry {
                session,
                last_seen: now,
            },
        );
        Ok(switch)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Drops expired sessions, then the least recently seen ones until a
    /// new entry fits.
    fn make_room(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_ttl);
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    sessions.remove(&key);
                    debug!(session = %key, "Evicted least recently seen session");
                }
                None => break,
            }
        }
    }
}

/// Build the HTTP API router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/status", get(routes::status))
        .route("/api/v1/profile/switch", post(routes::switch_profile))
        .route("/api/v1/ontology/ensure", post(routes::ensure_ontology))
        .route("/api/v1/objects", post(routes::create_object))
        .route("/api/v1/search", post(routes::search))
        .route(
            "/api/v1/spaces",
            get(routes::list_spaces).post(routes::create_space),
        )
        .route("/api/v1/stats", get(routes::graph_stats))
        .with_state(state)
}
