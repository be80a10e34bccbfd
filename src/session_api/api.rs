use std::sync::Arc;

use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::auth::AuthTokenProvider;
use super::backend::{resolve_base_url, BackendLocator};
use super::error::{ErrorKind, SessionApiError};
use super::types::{
    error_message, parse_error_body, start_session_body, EndReason, EndSessionRequest,
    HeartbeatDecision, HeartbeatRequest, ScreenshotRequest, UNKNOWN_ERROR,
};
use crate::config::ClientConfig;

/// API endpoints (relative to the backend base URL)
const USER_PROFILE_PATH: &str = "/api/v1/users/me";
const SESSION_PATH: &str = "/api/v1/realtime/session";
const HEARTBEAT_PATH: &str = "/api/v1/realtime/heartbeat";
const SCREENSHOT_PATH: &str = "/api/v1/analyze/screenshot";

const START_SESSION_FAILED: &str = "Failed to start session";
const SCREENSHOT_FAILED: &str = "Failed to analyze screenshot";

/// Client for the backend's realtime session and quota endpoints
///
/// Stateless between calls: the token and base URL are read fresh for every
/// request and the caller keeps track of the session id and elapsed time.
/// Cheap to clone.
#[derive(Clone)]
pub struct SessionQuotaClient {
    http: reqwest::Client,
    auth: Arc<dyn AuthTokenProvider>,
    backend: Arc<dyn BackendLocator>,
    config: ClientConfig,
}

impl SessionQuotaClient {
    pub fn new(
        auth: impl AuthTokenProvider + 'static,
        backend: impl BackendLocator + 'static,
        config: ClientConfig,
    ) -> Result<Self, SessionApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            auth: Arc::new(auth),
            backend: Arc::new(backend),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", resolve_base_url(self.backend.as_ref(), &self.config))
    }

    /// `{SESSION_PATH}/{session_id}/end`, with the id percent-encoded as one segment
    fn end_session_url(&self, session_id: &str) -> Result<Url, SessionApiError> {
        let mut url = Url::parse(&self.url(SESSION_PATH))
            .map_err(|e| SessionApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SessionApiError::InvalidUrl("base URL cannot have a path".to_string()))?
            .push(session_id)
            .push("end");
        Ok(url)
    }

    /// JSON content type, plus a bearer token when one is available
    fn headers(&self) -> Result<HeaderMap, SessionApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.auth.current_id_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| SessionApiError::InvalidToken(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Fetch the signed-in user's profile and entitlements
    ///
    /// Non-2xx responses fail with the status and raw body; nothing is
    /// classified or retried.
    pub async fn fetch_user_profile(&self) -> Result<Value, SessionApiError> {
        let response = self
            .http
            .get(self.url(USER_PROFILE_PATH))
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| UNKNOWN_ERROR.to_string());
            log::warn!("Profile request returned {status}");
            return Err(SessionApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        decode_json(response).await
    }

    /// Start a managed realtime session
    ///
    /// `client_info` is sent as-is with `mode` set to `"managed"`. Quota,
    /// concurrency and entitlement rejections come back as distinct
    /// [`ErrorKind`]s. Single attempt.
    pub async fn start_session(
        &self,
        client_info: Map<String, Value>,
    ) -> Result<Value, SessionApiError> {
        log::info!("Starting managed realtime session");

        let response = self
            .http
            .post(self.url(SESSION_PATH))
            .headers(self.headers()?)
            .json(&start_session_body(client_info))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                rejection(response, ErrorKind::for_session_start, START_SESSION_FAILED).await,
            );
        }

        decode_json(response).await
    }

    /// Report total elapsed time and get a continue/stop decision
    ///
    /// Never fails. 402, 403 and 404 stop the session; any other error,
    /// including a network failure, lets it continue.
    pub async fn send_heartbeat(&self, session_id: &str, elapsed_seconds: u64) -> HeartbeatDecision {
        match self.try_send_heartbeat(session_id, elapsed_seconds).await {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("Heartbeat for session {session_id} failed, continuing: {e}");
                HeartbeatDecision::transport_failure(e.to_string())
            }
        }
    }

    async fn try_send_heartbeat(
        &self,
        session_id: &str,
        elapsed_seconds: u64,
    ) -> Result<HeartbeatDecision, SessionApiError> {
        let body = HeartbeatRequest {
            session_id,
            elapsed_seconds,
        };

        let response = self
            .http
            .post(self.url(HEARTBEAT_PATH))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: Value = decode_json(response).await?;
            let decision = HeartbeatDecision::from(body);
            log::debug!(
                "Heartbeat for session {session_id} at {elapsed_seconds}s: continue={}",
                decision.should_continue()
            );
            return Ok(decision);
        }

        match status.as_u16() {
            402 | 403 | 404 => {
                log::warn!("Heartbeat for session {session_id} rejected with {status}, stopping");
                Ok(HeartbeatDecision::server_rejection())
            }
            _ => {
                log::warn!("Heartbeat for session {session_id} returned {status}, ignoring");
                Ok(HeartbeatDecision::server_error_ignored())
            }
        }
    }

    /// Tell the backend the session is over
    ///
    /// Fire-and-forget: failures are logged and never returned. Use
    /// [`SessionQuotaClient::try_end_session`] to observe the outcome.
    pub async fn end_session(&self, session_id: &str, duration_seconds: u64, reason: EndReason) {
        if let Err(e) = self
            .try_end_session(session_id, duration_seconds, reason)
            .await
        {
            log::error!("Failed to report end of session {session_id}: {e}");
        }
    }

    /// Same request as [`SessionQuotaClient::end_session`], with the outcome
    pub async fn try_end_session(
        &self,
        session_id: &str,
        duration_seconds: u64,
        reason: EndReason,
    ) -> Result<(), SessionApiError> {
        let body = EndSessionRequest {
            duration_seconds,
            reason: &reason,
        };

        let response = self
            .http
            .post(self.end_session_url(session_id)?)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        log::info!("Session {session_id} ended after {duration_seconds}s ({reason})");
        Ok(())
    }

    /// Send a base64-encoded screenshot for analysis
    ///
    /// `model` falls back to the configured screenshot model.
    pub async fn analyze_screenshot(
        &self,
        image_base64: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<Value, SessionApiError> {
        let body = ScreenshotRequest {
            image: image_base64,
            prompt,
            model: model.unwrap_or(&self.config.screenshot_model),
        };
        log::debug!("Analyzing screenshot with {}", body.model);

        let response = self
            .http
            .post(self.url(SCREENSHOT_PATH))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response, ErrorKind::for_screenshot, SCREENSHOT_FAILED).await);
        }

        decode_json(response).await
    }

    /// Encode raw image bytes and send them for analysis
    pub async fn analyze_screenshot_bytes(
        &self,
        image: &[u8],
        prompt: &str,
        model: Option<&str>,
    ) -> Result<Value, SessionApiError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.analyze_screenshot(&encoded, prompt, model).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, SessionApiError> {
    response
        .json()
        .await
        .map_err(|e| SessionApiError::Decode(e.to_string()))
}

/// Turn a non-2xx response into a classified rejection
async fn rejection(
    response: Response,
    classify: fn(u16) -> ErrorKind,
    default_message: &str,
) -> SessionApiError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = error_message(&parse_error_body(&text), default_message);
    let kind = classify(status);

    log::warn!("Request rejected with {status} ({kind}): {message}");
    SessionApiError::Rejected {
        kind,
        status,
        message,
    }
}
