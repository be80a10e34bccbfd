//! Realtime session API module
//!
//! HTTP client for the backend's realtime-session endpoints:
//! - Session start with quota/concurrency classification
//! - Heartbeats with a fail-open/fail-closed decision per call
//! - Best-effort session end
//! - Profile fetch and screenshot analysis
//! - An optional heartbeat timer loop for callers

pub mod api;
pub mod auth;
pub mod backend;
pub mod error;
pub mod heartbeat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use api::SessionQuotaClient;
pub use auth::{AuthTokenProvider, SharedToken, StaticToken, StoredAuthToken};
pub use backend::{BackendLocator, BuildMode};
pub use error::{ErrorKind, SessionApiError};
pub use heartbeat::{HeartbeatMonitor, SessionSummary, StopCause};
pub use types::{EndReason, HeartbeatDecision};
