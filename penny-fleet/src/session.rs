//! Caller sessions.
//!
//! The active profile is an explicit value carried by the caller and passed
//! into every routed call, never process-wide state.

use penny_types::{ProfileName, SessionId};
use serde::{Deserialize, Serialize};

/// One caller's routing context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub active_profile: ProfileName,
}

impl Session {
    /// Starts a session on the given profile.
    pub fn new(active_profile: ProfileName) -> Self {
        Self {
            id: SessionId::new(),
            active_profile,
        }
    }

    pub fn active_profile(&self) -> &ProfileName {
        &self.active_profile
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ProfileName::default())
    }
}

/// Acknowledgement of a profile switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSwitch {
    pub previous_profile: ProfileName,
    pub current_profile: ProfileName,
}
