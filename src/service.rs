//! The logbook service: every operation the HTTP surface exposes.

use crate::diff::{categorize, diff_params, CategorizedView};
use crate::error::LogbookError;
use crate::gcode::{extract_params, ParamMap};
use crate::job::{Annotation, JobOutcome, JobStatus, PrintJob};
use crate::poller::{ControllerSnapshot, SharedSnapshot};
use crate::store::{JobStore, MaintenanceEvent, MaintenanceLog};
use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Manual uploads of a filename already logged within this window are
/// rejected as duplicates.
const UPLOAD_DUPLICATE_WINDOW_MINS: i64 = 10;

/// Auto-detection re-observes the same controller print across ticks; a
/// shorter window suppresses those repeats.
const AUTO_DUPLICATE_WINDOW_MINS: i64 = 3;

/// A job together with its diff against the chronologically previous print.
#[derive(Debug, Clone)]
pub struct JobWithDiff {
    pub job: PrintJob,
    pub changed_params: BTreeSet<String>,
    pub parameters: CategorizedView,
}

/// Everything the logbook knows, for download.
#[derive(Debug, serde::Serialize)]
pub struct ExportDocument {
    pub prints: Vec<PrintJob>,
    pub maintenance: Vec<MaintenanceEvent>,
}

pub struct Logbook {
    jobs: Arc<dyn JobStore>,
    maintenance: MaintenanceLog,
    snapshot: SharedSnapshot,
    upload_dir: PathBuf,
}

impl Logbook {
    pub fn new(jobs: Arc<dyn JobStore>, snapshot: SharedSnapshot, upload_dir: PathBuf) -> Self {
        Self {
            jobs,
            maintenance: MaintenanceLog::new(),
            snapshot,
            upload_dir,
        }
    }

    /// Log an uploaded print. Runs the parameter extractor synchronously and
    /// persists the G-code bytes under the upload directory.
    pub async fn create_job(&self, filename: &str, bytes: &[u8]) -> Result<PrintJob, LogbookError> {
        let filename = base_name(filename);
        if filename.is_empty() {
            return Err(LogbookError::Validation("no file selected".to_string()));
        }
        if !filename.ends_with(".gcode") {
            return Err(LogbookError::Validation("file must be a G-code file".to_string()));
        }
        if self.has_recent(filename, UPLOAD_DUPLICATE_WINDOW_MINS).await {
            return Err(LogbookError::Duplicate(filename.to_string()));
        }

        let path = self.save_gcode("", filename, bytes).await?;
        let params = extract_params(bytes);
        if params.is_empty() {
            tracing::debug!("No slicer metadata found in {}", filename);
        }

        let job = PrintJob::new(filename.to_string(), path, params);
        self.jobs.insert(job.clone()).await;
        tracing::info!("Logged print: {} ({})", job.filename, job.id);
        Ok(job)
    }

    /// Log a print the poller observed starting on the controller. Returns
    /// `None` when a recent job with the same filename already exists.
    pub async fn auto_create_job(
        &self,
        filename: &str,
        bytes: Option<&[u8]>,
    ) -> Result<Option<PrintJob>, LogbookError> {
        let filename = base_name(filename);
        if self.has_recent(filename, AUTO_DUPLICATE_WINDOW_MINS).await {
            return Ok(None);
        }

        let (path, params) = match bytes {
            Some(bytes) => {
                let path = self.save_gcode("auto_", filename, bytes).await?;
                (path, extract_params(bytes))
            }
            // File unavailable: log the print anyway with an empty mapping.
            None => (String::new(), ParamMap::new()),
        };

        let job = PrintJob::new(filename.to_string(), path, params);
        self.jobs.insert(job.clone()).await;
        Ok(Some(job))
    }

    /// Submit the outcome annotation for a job. Idempotent overwrite; the
    /// supplied status always wins, even over a prior terminal state.
    pub async fn complete_job(
        &self,
        id: Uuid,
        annotation: Annotation,
    ) -> Result<PrintJob, LogbookError> {
        annotation.validate()?;
        self.jobs
            .update_with(id, Box::new(move |job| job.annotate(&annotation)))
            .await
    }

    /// Apply a terminal-pending edge from the poller.
    pub async fn record_edge(&self, id: Uuid, outcome: JobOutcome) -> Result<PrintJob, LogbookError> {
        self.jobs
            .update_with(id, Box::new(move |job| {
                job.apply_edge(outcome);
            }))
            .await
    }

    pub async fn get_job(&self, id: Uuid) -> Result<PrintJob, LogbookError> {
        self.jobs.get(id).await.ok_or(LogbookError::JobNotFound(id))
    }

    /// All jobs, newest first, each with the set of parameters that changed
    /// relative to the chronologically previous print and the categorized
    /// parameter view. Adjacency is recomputed on every call: a job inserted
    /// later with an earlier `start_time` changes its neighbors' diffs.
    pub async fn list_jobs_with_diff(&self) -> Vec<JobWithDiff> {
        let mut jobs = self.jobs.all().await;
        // Chronological order; ties broken by id to keep the order total.
        jobs.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut result = Vec::with_capacity(jobs.len());
        let mut previous_params: Option<&ParamMap> = None;
        for job in &jobs {
            let changed = match previous_params {
                Some(previous) => diff_params(&job.all_slicer_params, previous),
                None => BTreeSet::new(),
            };
            let parameters = categorize(&job.all_slicer_params, &changed);
            result.push(JobWithDiff {
                job: job.clone(),
                changed_params: changed,
                parameters,
            });
            previous_params = Some(&job.all_slicer_params);
        }

        result.reverse();
        result
    }

    /// The job the poller currently tracks: the most recently started job
    /// still in `printing`.
    pub async fn latest_printing_job(&self) -> Option<PrintJob> {
        self.jobs
            .all()
            .await
            .into_iter()
            .filter(|job| job.status == JobStatus::Printing)
            .max_by_key(|job| (job.start_time, job.id))
    }

    /// Non-blocking clone of the connectivity snapshot.
    pub async fn connectivity_snapshot(&self) -> ControllerSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn create_maintenance(
        &self,
        description: String,
        todo_tasks: Option<String>,
    ) -> MaintenanceEvent {
        self.maintenance.create(description, todo_tasks).await
    }

    pub async fn list_maintenance(&self) -> Vec<MaintenanceEvent> {
        self.maintenance.list().await
    }

    pub async fn update_maintenance(
        &self,
        id: Uuid,
        description: Option<String>,
        todo_tasks: Option<String>,
    ) -> Result<MaintenanceEvent, LogbookError> {
        self.maintenance.update(id, description, todo_tasks).await
    }

    /// Full dump of prints and maintenance events.
    pub async fn export(&self) -> ExportDocument {
        let mut prints = self.jobs.all().await;
        prints.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        ExportDocument {
            prints,
            maintenance: self.maintenance.list().await,
        }
    }

    async fn has_recent(&self, filename: &str, window_mins: i64) -> bool {
        let cutoff = Utc::now() - Duration::minutes(window_mins);
        self.jobs
            .all()
            .await
            .iter()
            .any(|job| job.filename == filename && job.start_time >= cutoff)
    }

    async fn save_gcode(
        &self,
        prefix: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, LogbookError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let stored_name = format!(
            "{}{}_{}",
            prefix,
            Utc::now().format("%Y%m%d_%H%M%S"),
            filename
        );
        let path = self.upload_dir.join(stored_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Strip any path components a client sneaks into the filename.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}
