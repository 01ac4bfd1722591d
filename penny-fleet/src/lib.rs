//! Profile routing and backend clients for the identity fleet.
//!
//! Each profile (`personal`, `work`, `research`, ...) is served by its own
//! isolated graph-database node. This crate provides:
//!
//! - **Backend**: the [`SchemaBackend`] capability every node exposes
//! - **HTTP**: a bearer-token client for the node's JSON API
//! - **Router**: copy-on-write profile → backend resolution
//! - **Session**: the explicit per-caller active profile
//!
//! # Example
//!
//! ```no_run
//! use penny_fleet::{FleetConfig, ProfileRouter};
//!
//! # async fn demo() -> penny_fleet::FleetResult<()> {
//! let router = ProfileRouter::from_config(&FleetConfig::default())?;
//! let mut session = router.new_session();
//! router.switch_profile(&mut session, "work").await?;
//! let route = router.resolve(&session, None).await?;
//! assert_eq!(route.profile.as_str(), "work");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
mod error;
pub mod http;
pub mod router;
pub mod session;

pub use backend::{
    DEFAULT_SEARCH_LIMIT, HealthState, MAX_SEARCH_LIMIT, NewObject, NewSpace, SchemaBackend,
    SearchQuery,
};
pub use config::{FleetConfig, ProfileConfig};
pub use error::{BackendError, BackendResult, FleetError, FleetResult};
pub use http::{HttpBackend, HttpBackendConfig};
pub use router::{ProfileRouter, Route};
pub use session::{ProfileSwitch, Session};
