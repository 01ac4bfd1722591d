//! Profile router.
//!
//! Resolves a profile name to its backend. The routing table is read-mostly:
//! every mutation builds a new table and swaps it in whole, so a concurrent
//! resolution sees either the old table or the new one, never a mix.

use crate::backend::{HealthState, SchemaBackend};
use crate::config::FleetConfig;
use crate::error::{FleetError, FleetResult};
use crate::http::HttpBackend;
use crate::session::{ProfileSwitch, Session};
use penny_types::ProfileName;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A resolved routing target.
#[derive(Clone)]
pub struct Route {
    pub profile: ProfileName,
    pub backend: Arc<dyn SchemaBackend>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("profile", &self.profile)
            .field("backend", self.backend.backend_id())
            .finish()
    }
}

type RoutingTable = BTreeMap<ProfileName, Arc<dyn SchemaBackend>>;

/// Routes calls to the backend configured for a profile.
pub struct ProfileRouter {
    default_profile: ProfileName,
    table: RwLock<Arc<RoutingTable>>,
}

impl ProfileRouter {
    /// Creates a router over an explicit set of backends.
    pub fn new(
        default_profile: ProfileName,
        routes: impl IntoIterator<Item = (ProfileName, Arc<dyn SchemaBackend>)>,
    ) -> FleetResult<Self> {
        let table: RoutingTable = routes.into_iter().collect();
        if !table.contains_key(&default_profile) {
            return Err(FleetError::Config(format!(
                "default profile '{default_profile}' is not in the fleet"
            )));
        }
        Ok(Self {
            default_profile,
            table: RwLock::new(Arc::new(table)),
        })
    }

    /// Builds HTTP backends for every configured profile.
    pub fn from_config(config: &FleetConfig) -> FleetResult<Self> {
        let profiles = config.validated_profiles()?;
        let mut routes: Vec<(ProfileName, Arc<dyn SchemaBackend>)> = Vec::new();
        for (name, profile) in profiles {
            let backend = HttpBackend::new(profile.to_backend_config())?;
            info!(profile = %name, url = backend.base_url(), "Registered backend");
            routes.push((name, Arc::new(backend)));
        }
        Self::new(ProfileName::parse(&config.default_profile)?, routes)
    }

    /// The profile new sessions start on.
    pub fn default_profile(&self) -> &ProfileName {
        &self.default_profile
    }

    /// Starts a new session on the default profile.
    pub fn new_session(&self) -> Session {
        Session::new(self.default_profile.clone())
    }

    async fn snapshot(&self) -> Arc<RoutingTable> {
        self.table.read().await.clone()
    }

    /// Names of all routable profiles.
    pub async fn profiles(&self) -> Vec<ProfileName> {
        self.snapshot().await.keys().cloned().collect()
    }

    /// Resolves `profile`, or the session's active profile when omitted.
    pub async fn resolve(&self, session: &Session, profile: Option<&str>) -> FleetResult<Route> {
        let table = self.snapshot().await;
        let name = match profile {
            Some(raw) => ProfileName::parse(raw).map_err(|_| unknown(raw, &table))?,
            None => session.active_profile.clone(),
        };
        let backend = table
            .get(&name)
            .cloned()
            .ok_or_else(|| unknown(name.as_str(), &table))?;
        debug!(profile = %name, backend = %backend.backend_id(), "Resolved route");
        Ok(Route {
            profile: name,
            backend,
        })
    }

    /// Points the session at another profile.
    pub async fn switch_profile(
        &self,
        session: &mut Session,
        profile: &str,
    ) -> FleetResult<ProfileSwitch> {
        let table = self.snapshot().await;
        let name = ProfileName::parse(profile).map_err(|_| unknown(profile, &table))?;
        if !table.contains_key(&name) {
            return Err(unknown(profile, &table));
        }

        let previous = std::mem::replace(&mut session.active_profile, name.clone());
        info!(
            session = %session.id,
            previous_profile = %previous,
            new_profile = %name,
            "Profile switched"
        );
        Ok(ProfileSwitch {
            previous_profile: previous,
            current_profile: name,
        })
    }

    /// Adds or replaces a profile's backend.
    pub async fn upsert_profile(&self, profile: ProfileName, backend: Arc<dyn SchemaBackend>) {
        let mut guard = self.table.write().await;
        let mut next = RoutingTable::clone(&guard);
        info!(profile = %profile, backend = %backend.backend_id(), "Updating route");
        next.insert(profile, backend);
        *guard = Arc::new(next);
    }

    /// Removes a profile. The default profile cannot be removed.
    pub async fn remove_profile(&self, profile: &ProfileName) -> FleetResult<bool> {
        if *profile == self.default_profile {
            return Err(FleetError::Config(format!(
                "cannot remove default profile '{profile}'"
            )));
        }
        let mut guard = self.table.write().await;
        if !guard.contains_key(profile) {
            return Ok(false);
        }
        let mut next = RoutingTable::clone(&guard);
        next.remove(profile);
        *guard = Arc::new(next);
        info!(profile = %profile, "Removed route");
        Ok(true)
    }

    /// Checks one profile's backend, or every backend when `profile` is omitted.
    /// An unhealthy backend is reported, never raised.
    pub async fn health(
        &self,
        profile: Option<&str>,
    ) -> FleetResult<BTreeMap<ProfileName, HealthState>> {
        let table = self.snapshot().await;
        let targets: Vec<(ProfileName, Arc<dyn SchemaBackend>)> = match profile {
            Some(raw) => {
                let name = ProfileName::parse(raw).map_err(|_| unknown(raw, &table))?;
                let backend = table
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| unknown(raw, &table))?;
                vec![(name, backend)]
            }
            None => table.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };

        let checks = targets.into_iter().map(|(name, backend)| async move {
            let state = backend.health().await;
            if let HealthState::Unhealthy { reason } = &state {
                warn!(profile = %name, reason = %reason, "Health check failed");
            }
            (name, state)
        });
        Ok(futures::future::join_all(checks).await.into_iter().collect())
    }
}

fn unknown(name: &str, table: &RoutingTable) -> FleetError {
    FleetError::UnknownProfile {
        name: name.to_string(),
        available: table.keys().map(|k| k.to_string()).collect(),
    }
}
