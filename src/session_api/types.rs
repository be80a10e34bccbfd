use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Session mode sent with every session start
pub const MANAGED_MODE: &str = "managed";

/// Reason attached to a fail-closed heartbeat decision
pub const REASON_SERVER_REJECTION: &str = "server_rejection";

/// Reason attached to a fail-open decision after a non-2xx response
pub const REASON_SERVER_ERROR_IGNORED: &str = "server_error_ignored";

/// Fallback used when an error response body is not JSON
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Result of one heartbeat
///
/// On success this is the backend's JSON body, kept as-is whatever its
/// shape; the client only builds one itself when the backend could not give
/// an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct HeartbeatDecision(Value);

impl HeartbeatDecision {
    /// Fail closed: the backend rejected the session (402/403/404)
    pub fn server_rejection() -> Self {
        Self(json!({ "continue": false, "reason": REASON_SERVER_REJECTION }))
    }

    /// Fail open: the backend errored in some other way
    pub fn server_error_ignored() -> Self {
        Self(json!({ "continue": true, "reason": REASON_SERVER_ERROR_IGNORED }))
    }

    /// Fail open: no usable response at all
    ///
    /// `message` is the Display text of the failure, e.g.
    /// `"Request failed: error sending request ..."`.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self(json!({ "continue": true, "error": message.into() }))
    }

    /// Raw field of the decision body
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `continue` flag, when the body carries a boolean one
    pub fn continue_flag(&self) -> Option<bool> {
        self.get("continue").and_then(Value::as_bool)
    }

    /// Whether the session may keep running. Only an explicit
    /// `continue: false` stops it.
    pub fn should_continue(&self) -> bool {
        self.continue_flag().unwrap_or(true)
    }

    /// `reason` as text; non-string values are rendered as JSON
    pub fn reason(&self) -> Option<String> {
        self.get("reason").map(field_text)
    }

    /// `error` as text; non-string values are rendered as JSON
    pub fn error(&self) -> Option<String> {
        self.get("error").map(field_text)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for HeartbeatDecision {
    fn from(body: Value) -> Self {
        Self(body)
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EndReason {
    /// The user stopped the session
    #[default]
    UserEnded,
    /// A heartbeat told the client to stop
    ServerStopped,
    /// Anything else the caller wants to report
    Other(String),
}

impl EndReason {
    pub fn as_str(&self) -> &str {
        match self {
            EndReason::UserEnded => "user_ended",
            EndReason::ServerStopped => "server_stopped",
            EndReason::Other(reason) => reason,
        }
    }
}

impl From<&str> for EndReason {
    fn from(s: &str) -> Self {
        match s {
            "user_ended" => EndReason::UserEnded,
            "server_stopped" => EndReason::ServerStopped,
            other => EndReason::Other(other.to_string()),
        }
    }
}

impl From<String> for EndReason {
    fn from(s: String) -> Self {
        EndReason::from(s.as_str())
    }
}

impl Serialize for EndReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HeartbeatRequest<'a> {
    pub session_id: &'a str,
    pub elapsed_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct EndSessionRequest<'a> {
    pub duration_seconds: u64,
    pub reason: &'a EndReason,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScreenshotRequest<'a> {
    pub image: &'a str,
    pub prompt: &'a str,
    pub model: &'a str,
}

/// Session start body: caller's client info with `mode` forced to managed
pub(crate) fn start_session_body(mut client_info: Map<String, Value>) -> Value {
    client_info.insert("mode".to_string(), Value::String(MANAGED_MODE.to_string()));
    Value::Object(client_info)
}

/// Parse an error response body, falling back to `{"error": "Unknown error"}`
pub(crate) fn parse_error_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "error": UNKNOWN_ERROR }))
}

/// Human message from an error body: `error`, then `message`, then `default`
pub(crate) fn error_message(body: &Value, default: &str) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .find(|msg| !msg.is_empty())
        .unwrap_or(default)
        .to_string()
}
