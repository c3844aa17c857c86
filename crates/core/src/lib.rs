//! Core types and traits for the wayfinder road-trip assistant
//!
//! This crate provides the foundational abstractions used throughout the
//! workspace, including:
//!
//! - **Entities**: cities, route waypoints and inferred preferences
//! - **Session boundary**: the [`SessionStore`] trait and an in-memory store
//! - **Clock**: injectable time source for windows, cooldowns and TTLs
//! - **Configuration**: layered system configuration
//! - **Error handling**: unified error types
//! - **JSON extraction**: pulling structured data out of model text
//!

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod clock;
pub mod config;
pub mod entities;
pub mod error;
pub mod geo;
pub mod json;
pub mod route;
pub mod session;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AgentConfig, CacheConfig, Config, DiscoveryConfig, LlmConfig, RateLimitConfig, ServerConfig,
    TriggerConfig,
};
pub use entities::{normalize_name, City, Preference};
pub use error::{Error, Result, ResultExt};
pub use geo::{haversine_km, GeoPoint};
pub use json::{extract_json, parse_json, JsonExtractError};
pub use route::{Leg, RouteAction, RouteState, Waypoint};
pub use session::{ConversationTurn, InMemorySessionStore, Role, SessionStore};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::entities::City;
    pub use crate::error::{Result, ResultExt};
    pub use crate::route::RouteState;
    pub use crate::session::SessionStore;
}
