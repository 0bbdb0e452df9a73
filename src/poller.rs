//! Printer status polling.
//!
//! A single background task queries the controller's status endpoint on a
//! fixed interval, owns the process-wide connectivity snapshot, and turns
//! observed activity changes into lifecycle edges for the tracked print job.
//! A failed poll only flips `connected` to false; absence of information is
//! never interpreted as a job ending.

use crate::error::ControllerError;
use crate::job::{JobOutcome, JobStatus};
use crate::service::Logbook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;

/// What one status query to the controller reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub job_active: bool,
    pub job_outcome: Option<JobOutcome>,
    pub filename: Option<String>,
}

/// Read-only view of the external controller.
#[async_trait]
pub trait ControllerClient: Send + Sync {
    async fn query_status(&self) -> Result<ControllerStatus, ControllerError>;

    /// Download a G-code file stored on the controller.
    async fn fetch_gcode(&self, filename: &str) -> Result<Vec<u8>, ControllerError>;
}

/// Moonraker implementation of [`ControllerClient`].
pub struct MoonrakerClient {
    http: reqwest::Client,
    base_url: String,
}

impl MoonrakerClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ControllerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ControllerClient for MoonrakerClient {
    async fn query_status(&self) -> Result<ControllerStatus, ControllerError> {
        let url = format!("{}/printer/objects/query?print_stats", self.base_url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ControllerError::Status(response.status().as_u16()));
        }
        let body: serde_json::Value = response.json().await?;
        let stats = body
            .pointer("/result/status/print_stats")
            .ok_or_else(|| ControllerError::Payload("missing print_stats".to_string()))?;

        let state = stats.get("state").and_then(|v| v.as_str()).unwrap_or("standby");
        let filename = stats
            .get("filename")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        // A paused job is still an active job on the controller.
        let (job_active, job_outcome) = match state {
            "printing" | "paused" => (true, None),
            "complete" => (false, Some(JobOutcome::Success)),
            "cancelled" => (false, Some(JobOutcome::Cancelled)),
            "error" => (false, Some(JobOutcome::Error)),
            _ => (false, None),
        };

        Ok(ControllerStatus { job_active, job_outcome, filename })
    }

    async fn fetch_gcode(&self, filename: &str) -> Result<Vec<u8>, ControllerError> {
        let url = format!("{}/server/files/gcodes/{}", self.base_url, filename);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ControllerError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Process-wide connectivity snapshot. Overwritten whole on every tick so
/// readers never observe a half-written update; readers always get a clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    /// `None` until the first poll completes.
    pub connected: Option<bool>,
    pub active_job_present: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            connected: None,
            active_job_present: false,
            last_checked: None,
        }
    }
}

pub type SharedSnapshot = Arc<RwLock<ControllerSnapshot>>;

/// Decide whether this tick's controller status ends the tracked print.
/// Pure function of its inputs; only ever called after a successful poll.
pub fn detect_edge(
    previous: &ControllerSnapshot,
    status: &ControllerStatus,
    tracked_job_status: JobStatus,
) -> Option<JobOutcome> {
    if tracked_job_status != JobStatus::Printing {
        return None;
    }
    if status.job_active {
        return None;
    }
    if previous.active_job_present {
        tracing::debug!("Controller activity edge: active -> idle");
    }
    // The controller no longer reports the job we track as printing. Default
    // outcome is cancelled unless the controller says the print completed.
    Some(status.job_outcome.unwrap_or(JobOutcome::Cancelled))
}

/// The periodic polling task.
pub struct StatusPoller {
    client: Arc<dyn ControllerClient>,
    logbook: Arc<Logbook>,
    snapshot: SharedSnapshot,
    poll_interval: Duration,
    last_active_filename: Option<String>,
}

impl StatusPoller {
    pub fn new(
        client: Arc<dyn ControllerClient>,
        logbook: Arc<Logbook>,
        snapshot: SharedSnapshot,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            logbook,
            snapshot,
            poll_interval,
            last_active_filename: None,
        }
    }

    /// Run until a shutdown signal arrives. Ticks that fire while a query is
    /// still outstanding are skipped, so at most one query is in flight.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Status poller shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    /// One poll tick: query the controller, reconcile job state, refresh the
    /// snapshot. Never emits job edges on a failed poll.
    pub async fn poll_once(&mut self) {
        match self.client.query_status().await {
            Ok(status) => self.reconcile(status).await,
            Err(e) => {
                tracing::warn!("Controller poll failed: {}", e);
                let mut snapshot = self.snapshot.write().await;
                snapshot.connected = Some(false);
                snapshot.last_checked = Some(Utc::now());
                // active_job_present keeps its last known value
            }
        }
    }

    async fn reconcile(&mut self, status: ControllerStatus) {
        let previous = self.snapshot.read().await.clone();

        if let Some(job) = self.logbook.latest_printing_job().await {
            if let Some(outcome) = detect_edge(&previous, &status, job.status) {
                match self.logbook.record_edge(job.id, outcome).await {
                    Ok(_) => {
                        tracing::info!("Print {} left the controller: {:?}", job.filename, outcome)
                    }
                    Err(e) => tracing::error!("Failed to record edge for {}: {}", job.id, e),
                }
            }
        }

        // Prints started directly on the controller get logged too.
        if status.job_active {
            if let Some(filename) = status.filename.clone() {
                if self.last_active_filename.as_deref() != Some(filename.as_str()) {
                    self.auto_register(&filename).await;
                }
                self.last_active_filename = Some(filename);
            }
        } else {
            self.last_active_filename = None;
        }

        *self.snapshot.write().await = ControllerSnapshot {
            connected: Some(true),
            active_job_present: status.job_active,
            last_checked: Some(Utc::now()),
        };
    }

    async fn auto_register(&self, filename: &str) {
        let bytes = match self.client.fetch_gcode(filename).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                // Still log the print; it just gets an empty parameter map.
                tracing::warn!("Could not fetch G-code for {}: {}", filename, e);
                None
            }
        };
        match self.logbook.auto_create_job(filename, bytes.as_deref()).await {
            Ok(Some(job)) => tracing::info!("Auto-detected print: {} ({})", job.filename, job.id),
            Ok(None) => tracing::debug!("Skipped duplicate auto-detected print: {}", filename),
            Err(e) => tracing::error!("Failed to log auto-detected print {}: {}", filename, e),
        }
    }
}
