//! In-process backend stub for client tests
//!
//! Records every request and answers with whatever status/body was scripted
//! for its path (404 otherwise), optionally after a delay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;

use super::api::SessionQuotaClient;
use super::auth::AuthTokenProvider;
use super::backend::BuildMode;
use crate::config::ClientConfig;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[derive(Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Duration,
}

#[derive(Clone, Default)]
struct StubState {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub(crate) struct StubBackend {
    pub base_url: String,
    state: StubState,
}

impl StubBackend {
    pub async fn start() -> Self {
        let state = StubState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Script a raw text response for a path
    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.respond_after(path, status, body, Duration::ZERO);
    }

    /// Script a response that is only sent after `delay`
    pub fn respond_after(&self, path: &str, status: u16, body: &str, delay: Duration) {
        let route = Route {
            status,
            body: body.to_string(),
            delay,
        };
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), route);
    }

    /// Script a JSON response for a path
    pub fn respond_json(&self, path: &str, status: u16, body: Value) {
        self.respond(path, status, &body.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.requests_to(path).pop()
    }

    /// Development-mode client pointed at this stub
    pub fn client(&self, auth: impl AuthTokenProvider + 'static) -> SessionQuotaClient {
        SessionQuotaClient::new(auth, BuildMode::Development, self.config()).unwrap()
    }

    /// Default config with the development URL pointed at this stub
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            development_base_url: self.base_url.clone(),
            ..Default::default()
        }
    }
}

async fn handle(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        headers,
        body: serde_json::from_slice(&body).ok(),
    });

    let scripted = state.routes.lock().unwrap().get(&path).cloned();
    let route = scripted.unwrap_or_else(|| Route {
        status: 404,
        body: r#"{"error":"Not found"}"#.to_string(),
        delay: Duration::ZERO,
    });
    if !route.delay.is_zero() {
        tokio::time::sleep(route.delay).await;
    }

    (StatusCode::from_u16(route.status).unwrap(), route.body).into_response()
}

/// Base URL of a port nothing listens on
pub(crate) fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
