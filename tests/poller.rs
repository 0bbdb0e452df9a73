//! Integration tests for the status poller: snapshot discipline, edge
//! emission, resilience to failed polls, and auto-detection.

use async_trait::async_trait;
use printer_logbook::error::ControllerError;
use printer_logbook::job::{JobOutcome, JobStatus};
use printer_logbook::poller::{
    ControllerClient, ControllerSnapshot, ControllerStatus, SharedSnapshot, StatusPoller,
};
use printer_logbook::service::Logbook;
use printer_logbook::store::MemoryJobStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// A controller that replays a scripted sequence of poll results.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<ControllerStatus, ControllerError>>>,
    gcode: Option<Vec<u8>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<ControllerStatus, ControllerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            gcode: None,
        }
    }

    fn with_gcode(mut self, gcode: &[u8]) -> Self {
        self.gcode = Some(gcode.to_vec());
        self
    }
}

#[async_trait]
impl ControllerClient for ScriptedClient {
    async fn query_status(&self) -> Result<ControllerStatus, ControllerError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ControllerError::Payload("script exhausted".to_string())))
    }

    async fn fetch_gcode(&self, _filename: &str) -> Result<Vec<u8>, ControllerError> {
        match &self.gcode {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(ControllerError::Payload("file not on controller".to_string())),
        }
    }
}

fn unreachable() -> Result<ControllerStatus, ControllerError> {
    Err(ControllerError::Payload("connection refused".to_string()))
}

fn active(filename: &str) -> Result<ControllerStatus, ControllerError> {
    Ok(ControllerStatus {
        job_active: true,
        job_outcome: None,
        filename: Some(filename.to_string()),
    })
}

fn idle(outcome: Option<JobOutcome>) -> Result<ControllerStatus, ControllerError> {
    Ok(ControllerStatus {
        job_active: false,
        job_outcome: outcome,
        filename: None,
    })
}

fn setup(
    client: ScriptedClient,
) -> (StatusPoller, Arc<Logbook>, SharedSnapshot, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let snapshot: SharedSnapshot = Arc::new(RwLock::new(ControllerSnapshot::default()));
    let store = Arc::new(MemoryJobStore::new());
    let logbook = Arc::new(Logbook::new(
        store,
        snapshot.clone(),
        dir.path().to_path_buf(),
    ));
    let poller = StatusPoller::new(
        Arc::new(client),
        logbook.clone(),
        snapshot.clone(),
        Duration::from_secs(15),
    );
    (poller, logbook, snapshot, dir)
}

#[tokio::test]
async fn test_failed_polls_never_end_a_job() {
    let client = ScriptedClient::new(vec![unreachable(), unreachable(), unreachable()]);
    let (mut poller, logbook, snapshot, _dir) = setup(client);

    let job = logbook.create_job("benchy.gcode", b"G28\n").await.unwrap();

    for _ in 0..3 {
        poller.poll_once().await;
    }

    let snap = snapshot.read().await.clone();
    assert_eq!(snap.connected, Some(false));
    assert!(snap.last_checked.is_some());
    // Absence of information is not a job ending
    let job = logbook.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Printing);
}

#[tokio::test]
async fn test_successful_idle_poll_ends_printing_job_as_cancelled() {
    let client = ScriptedClient::new(vec![unreachable(), idle(None)]);
    let (mut poller, logbook, snapshot, _dir) = setup(client);

    let job = logbook.create_job("benchy.gcode", b"G28\n").await.unwrap();

    poller.poll_once().await;
    assert_eq!(logbook.get_job(job.id).await.unwrap().status, JobStatus::Printing);

    poller.poll_once().await;
    let job = logbook.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.end_time.is_some());

    let snap = snapshot.read().await.clone();
    assert_eq!(snap.connected, Some(true));
    assert!(!snap.active_job_present);
}

#[tokio::test]
async fn test_controller_reported_completion_carries_success() {
    let client = ScriptedClient::new(vec![idle(Some(JobOutcome::Success))]);
    let (mut poller, logbook, _snapshot, _dir) = setup(client);

    let job = logbook.create_job("benchy.gcode", b"G28\n").await.unwrap();
    poller.poll_once().await;

    assert_eq!(logbook.get_job(job.id).await.unwrap().status, JobStatus::Success);
}

#[tokio::test]
async fn test_terminal_job_is_untouched_by_later_polls() {
    let client = ScriptedClient::new(vec![idle(None), idle(Some(JobOutcome::Success)), unreachable()]);
    let (mut poller, logbook, _snapshot, _dir) = setup(client);

    let job = logbook.create_job("benchy.gcode", b"G28\n").await.unwrap();

    poller.poll_once().await;
    assert_eq!(logbook.get_job(job.id).await.unwrap().status, JobStatus::Cancelled);

    // Neither a success report nor a failed poll moves it again
    poller.poll_once().await;
    poller.poll_once().await;
    assert_eq!(logbook.get_job(job.id).await.unwrap().status, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_snapshot_keeps_last_activity_on_failure() {
    let client = ScriptedClient::new(vec![active("benchy.gcode"), unreachable()])
        .with_gcode(b"; layer_height = 0.2\nG28\n");
    let (mut poller, _logbook, snapshot, _dir) = setup(client);

    poller.poll_once().await;
    let snap = snapshot.read().await.clone();
    assert_eq!(snap.connected, Some(true));
    assert!(snap.active_job_present);

    poller.poll_once().await;
    let snap = snapshot.read().await.clone();
    assert_eq!(snap.connected, Some(false));
    // Last known activity is retained across the failure
    assert!(snap.active_job_present);
}

#[tokio::test]
async fn test_auto_detection_logs_controller_started_print() {
    let client = ScriptedClient::new(vec![active("benchy.gcode"), active("benchy.gcode")])
        .with_gcode(b"; layer_height = 0.2\nG28\n");
    let (mut poller, logbook, _snapshot, _dir) = setup(client);

    poller.poll_once().await;
    let jobs = logbook.list_jobs_with_diff().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job.filename, "benchy.gcode");
    assert_eq!(jobs[0].job.status, JobStatus::Printing);
    assert_eq!(
        jobs[0].job.all_slicer_params.get("layer_height").map(String::as_str),
        Some("0.2")
    );

    // The same print observed on the next tick is not logged twice
    poller.poll_once().await;
    assert_eq!(logbook.list_jobs_with_diff().await.len(), 1);
}

#[tokio::test]
async fn test_auto_detection_without_file_still_logs_print() {
    let client = ScriptedClient::new(vec![active("mystery.gcode")]);
    let (mut poller, logbook, _snapshot, _dir) = setup(client);

    poller.poll_once().await;
    let jobs = logbook.list_jobs_with_diff().await;
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].job.all_slicer_params.is_empty());
    assert!(jobs[0].job.gcode_path.is_empty());
}

#[tokio::test]
async fn test_full_cycle_auto_detect_then_completion() {
    let client = ScriptedClient::new(vec![
        active("benchy.gcode"),
        idle(Some(JobOutcome::Success)),
    ])
    .with_gcode(b"G28\n");
    let (mut poller, logbook, snapshot, _dir) = setup(client);

    poller.poll_once().await;
    poller.poll_once().await;

    let jobs = logbook.list_jobs_with_diff().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job.status, JobStatus::Success);
    assert_eq!(snapshot.read().await.connected, Some(true));
}
