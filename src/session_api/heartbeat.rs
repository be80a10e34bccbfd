//! Heartbeat timer for a running session
//!
//! Callers that don't want to drive heartbeats themselves can hand the
//! session to a [`HeartbeatMonitor`]. It sends one heartbeat per interval,
//! never two at once, stops when the backend says so or when asked to,
//! and reports the session end exactly once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::api::SessionQuotaClient;
use super::types::{EndReason, HeartbeatDecision};
use crate::config::MIN_HEARTBEAT_INTERVAL;

/// What ended a monitored session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum StopCause {
    /// A heartbeat came back with `continue: false`
    Server { reason: Option<String> },
    /// `stop` was called, or the monitor was dropped
    Caller { reason: EndReason },
}

/// Summary of a monitored session, returned once it is over
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub heartbeats_sent: u32,
    pub stop_cause: StopCause,
}

pub struct HeartbeatMonitor {
    session_id: String,
    stop_tx: Option<oneshot::Sender<EndReason>>,
    decisions: watch::Receiver<Option<HeartbeatDecision>>,
    task: JoinHandle<SessionSummary>,
}

impl HeartbeatMonitor {
    /// Start sending heartbeats for `session_id` every `interval`
    ///
    /// Elapsed time is counted from this call. A zero `interval` falls back
    /// to the minimum heartbeat interval. Must be called from within a tokio
    /// runtime.
    pub fn spawn(client: SessionQuotaClient, session_id: impl Into<String>, interval: Duration) -> Self {
        let session_id = session_id.into();
        let interval = if interval.is_zero() {
            log::warn!("Zero heartbeat interval for session {session_id}, using {MIN_HEARTBEAT_INTERVAL}s");
            Duration::from_secs(MIN_HEARTBEAT_INTERVAL)
        } else {
            interval
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let (decision_tx, decisions) = watch::channel(None);

        log::info!("Monitoring session {session_id} every {interval:?}");
        let task = tokio::spawn(run(
            client,
            session_id.clone(),
            interval,
            stop_rx,
            decision_tx,
        ));

        Self {
            session_id,
            stop_tx: Some(stop_tx),
            decisions,
            task,
        }
    }

    /// Same as [`HeartbeatMonitor::spawn`], using the client's configured interval
    pub fn spawn_with_config(client: SessionQuotaClient, session_id: impl Into<String>) -> Self {
        let interval = client.config().heartbeat_interval();
        Self::spawn(client, session_id, interval)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Latest heartbeat decision (`None` before the first heartbeat)
    pub fn decisions(&self) -> watch::Receiver<Option<HeartbeatDecision>> {
        self.decisions.clone()
    }

    /// Whether the monitor has already stopped on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop heartbeats and report the end of the session
    ///
    /// If the backend already stopped the session, its summary is returned
    /// unchanged.
    pub async fn stop(mut self, reason: EndReason) -> Result<SessionSummary, String> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The task may already be gone after a server stop
            let _ = stop_tx.send(reason);
        }
        self.join().await
    }

    /// Wait until the backend stops the session
    pub async fn wait(self) -> Result<SessionSummary, String> {
        self.join().await
    }

    async fn join(self) -> Result<SessionSummary, String> {
        let Self { stop_tx, task, .. } = self;
        // Keep the stop channel open while waiting, so waiting is not a stop request
        let summary = task
            .await
            .map_err(|e| format!("Heartbeat task failed: {e}"));
        drop(stop_tx);
        summary
    }
}

async fn run(
    client: SessionQuotaClient,
    session_id: String,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<EndReason>,
    decision_tx: watch::Sender<Option<HeartbeatDecision>>,
) -> SessionSummary {
    let started_at = Utc::now();
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut heartbeats_sent = 0u32;

    let stop_cause = loop {
        tokio::select! {
            reason = &mut stop_rx => break StopCause::Caller { reason: reason.unwrap_or_default() },
            _ = ticker.tick() => {}
        }

        let elapsed_seconds = started.elapsed().as_secs();
        let decision = tokio::select! {
            reason = &mut stop_rx => break StopCause::Caller { reason: reason.unwrap_or_default() },
            decision = client.send_heartbeat(&session_id, elapsed_seconds) => decision,
        };
        heartbeats_sent += 1;

        let keep_going = decision.should_continue();
        let reason = decision.reason();
        decision_tx.send_replace(Some(decision));

        if !keep_going {
            log::info!("Backend stopped session {session_id} ({reason:?})");
            break StopCause::Server { reason };
        }
    };

    let duration_seconds = started.elapsed().as_secs();
    let end_reason = match &stop_cause {
        StopCause::Caller { reason } => reason.clone(),
        StopCause::Server { .. } => EndReason::ServerStopped,
    };
    client
        .end_session(&session_id, duration_seconds, end_reason)
        .await;

    SessionSummary {
        session_id,
        started_at,
        ended_at: Utc::now(),
        duration_seconds,
        heartbeats_sent,
        stop_cause,
    }
}
