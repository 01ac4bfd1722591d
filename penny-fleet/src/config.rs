//! Fleet configuration: which profile routes to which backend.

use crate::error::{FleetError, FleetResult};
use crate::http::HttpBackendConfig;
use penny_types::ProfileName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default Heart API port of an identity node.
pub const DEFAULT_NODE_PORT: u16 = 31009;

/// Connection settings for a single profile.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub refresh_secret: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            refresh_secret: None,
            timeout_ms: 30_000,
        }
    }
}

impl ProfileConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn to_backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            refresh_secret: self.refresh_secret.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

impl fmt::Debug for ProfileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileConfig")
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

/// The fleet map plus the profile new sessions start on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub default_profile: String,
    #[serde(rename = "fleet")]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        let profiles = ["personal", "work", "research"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    ProfileConfig::new(format!("http://heart-{name}:{DEFAULT_NODE_PORT}")),
                )
            })
            .collect();
        Self {
            default_profile: ProfileName::DEFAULT.to_string(),
            profiles,
        }
    }
}

impl FleetConfig {
    /// Applies `PENNY_URL_<PROFILE>` / `PENNY_TOKEN_<PROFILE>` /
    /// `PENNY_REFRESH_SECRET_<PROFILE>` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (name, profile) in &mut self.profiles {
            let suffix = name.to_uppercase().replace('-', "_");
            if let Some(url) = lookup(&format!("PENNY_URL_{suffix}")) {
                profile.base_url = url;
            }
            if let Some(token) = lookup(&format!("PENNY_TOKEN_{suffix}")) {
                profile.token = Some(token);
            }
            if let Some(secret) = lookup(&format!("PENNY_REFRESH_SECRET_{suffix}")) {
                profile.refresh_secret = Some(secret);
            }
        }
    }

    /// Parses every profile name and checks the fleet is routable.
    pub fn validated_profiles(&self) -> FleetResult<BTreeMap<ProfileName, ProfileConfig>> {
        let mut out = BTreeMap::new();
        for (name, profile) in &self.profiles {
            let parsed = ProfileName::parse(name)?;
            let url = profile.base_url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(FleetError::Config(format!(
                    "profile '{name}' has invalid base_url '{url}'"
                )));
            }
            if out.insert(parsed, profile.clone()).is_some() {
                return Err(FleetError::Config(format!(
                    "profile '{name}' is declared more than once"
                )));
            }
        }

        let default = ProfileName::parse(&self.default_profile)?;
        if !out.contains_key(&default) {
            return Err(FleetError::Config(format!(
                "default profile '{default}' is not in the fleet"
            )));
        }
        Ok(out)
    }
}
