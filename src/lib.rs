//! Managed realtime session client
//!
//! Talks to the Copilot backend on behalf of the desktop app:
//! - Starting metered ("managed") realtime sessions
//! - Heartbeats that enforce quota and concurrency limits
//! - Reporting session end
//! - User profile and screenshot analysis
//!
//! The auth token and the build mode are injected through
//! [`AuthTokenProvider`] and [`BackendLocator`]; the client keeps no state
//! between calls.

pub mod config;
pub mod session_api;

pub use config::ClientConfig;
pub use session_api::{
    AuthTokenProvider, BackendLocator, BuildMode, EndReason, ErrorKind, HeartbeatDecision,
    HeartbeatMonitor, SessionApiError, SessionQuotaClient, SessionSummary, StopCause,
};
