// src/job.rs - Print job record and lifecycle state machine
use crate::error::LogbookError;
use crate::gcode::ParamMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a print job. `Printing` is the only non-terminal
/// state; no transition ever leaves a terminal state except an explicit
/// annotation override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Printing,
    Success,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Printing)
    }
}

/// Terminal outcome carried by a poller edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Cancelled,
    Error,
}

impl From<JobOutcome> for JobStatus {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Success => JobStatus::Success,
            JobOutcome::Cancelled => JobStatus::Cancelled,
            JobOutcome::Error => JobStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrintJob {
    pub id: Uuid,
    pub filename: String,
    /// Where the uploaded G-code landed on disk; empty when the file could
    /// not be retrieved.
    pub gcode_path: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: JobStatus,
    /// Snapshot of the slicer configuration taken once at creation. Never
    /// mutated afterwards; all diffing runs against this.
    pub all_slicer_params: ParamMap,
    pub quality_rating: Option<u8>,
    pub functionality_rating: Option<u8>,
    pub label: Option<String>,
    pub ambient_temperature: Option<f64>,
    pub ambient_humidity: Option<f64>,
    pub notes: Option<String>,
}

impl PrintJob {
    pub fn new(filename: String, gcode_path: String, params: ParamMap) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            gcode_path,
            start_time: Utc::now(),
            end_time: None,
            status: JobStatus::Printing,
            all_slicer_params: params,
            quality_rating: None,
            functionality_rating: None,
            label: None,
            ambient_temperature: None,
            ambient_humidity: None,
            notes: None,
        }
    }

    /// Apply a terminal-pending edge from the poller. Ignored once the job
    /// has reached a terminal state. Returns whether the edge took effect.
    pub fn apply_edge(&mut self, outcome: JobOutcome) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = outcome.into();
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
        true
    }

    /// Overwrite annotation fields and force the status supplied by the
    /// caller. Idempotent, not gated on the current status: re-annotating a
    /// terminal job is the deliberate override path (e.g. marking a
    /// controller-reported cancellation as a success after inspection).
    pub fn annotate(&mut self, annotation: &Annotation) {
        self.status = annotation.status.into();
        self.quality_rating = annotation.quality_rating;
        self.functionality_rating = annotation.functionality_rating;
        self.label = annotation.label.clone();
        self.ambient_temperature = annotation.ambient_temperature;
        self.ambient_humidity = annotation.ambient_humidity;
        self.notes = annotation.notes.clone();
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }
}

/// Outcome annotation submitted by the user on completion.
#[derive(Debug, Clone, Deserialize)]
pub struct Annotation {
    #[serde(default = "default_annotation_status")]
    pub status: JobOutcome,
    pub quality_rating: Option<u8>,
    pub functionality_rating: Option<u8>,
    pub label: Option<String>,
    pub ambient_temperature: Option<f64>,
    pub ambient_humidity: Option<f64>,
    pub notes: Option<String>,
}

fn default_annotation_status() -> JobOutcome {
    JobOutcome::Success
}

impl Annotation {
    pub fn validate(&self) -> Result<(), LogbookError> {
        for (name, rating) in [
            ("quality_rating", self.quality_rating),
            ("functionality_rating", self.functionality_rating),
        ] {
            if let Some(value) = rating {
                if !(1..=10).contains(&value) {
                    return Err(LogbookError::Validation(format!(
                        "{name} must be between 1 and 10, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::ParamMap;

    fn annotation(status: JobOutcome) -> Annotation {
        Annotation {
            status,
            quality_rating: Some(8),
            functionality_rating: Some(9),
            label: Some("structural".to_string()),
            ambient_temperature: Some(22.5),
            ambient_humidity: Some(40.0),
            notes: None,
        }
    }

    #[test]
    fn test_new_job_is_printing() {
        let job = PrintJob::new("benchy.gcode".into(), String::new(), ParamMap::new());
        assert_eq!(job.status, JobStatus::Printing);
        assert!(job.end_time.is_none());
    }

    #[test]
    fn test_edge_moves_to_terminal_once() {
        let mut job = PrintJob::new("benchy.gcode".into(), String::new(), ParamMap::new());
        assert!(job.apply_edge(JobOutcome::Cancelled));
        assert_eq!(job.status, JobStatus::Cancelled);
        let end = job.end_time;
        assert!(end.is_some());

        // Terminal states are sticky against further edges
        assert!(!job.apply_edge(JobOutcome::Success));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.end_time, end);
    }

    #[test]
    fn test_annotation_overrides_terminal_status() {
        let mut job = PrintJob::new("benchy.gcode".into(), String::new(), ParamMap::new());
        job.apply_edge(JobOutcome::Cancelled);

        job.annotate(&annotation(JobOutcome::Success));
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.quality_rating, Some(8));
        assert_eq!(job.label.as_deref(), Some("structural"));
    }

    #[test]
    fn test_reannotation_overwrites_prior_values() {
        let mut job = PrintJob::new("benchy.gcode".into(), String::new(), ParamMap::new());
        job.annotate(&annotation(JobOutcome::Success));

        let mut second = annotation(JobOutcome::Cancelled);
        second.quality_rating = Some(3);
        second.label = None;
        job.annotate(&second);

        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.quality_rating, Some(3));
        assert!(job.label.is_none());
    }

    #[test]
    fn test_rating_validation() {
        let mut a = annotation(JobOutcome::Success);
        assert!(a.validate().is_ok());

        a.quality_rating = Some(0);
        assert!(a.validate().is_err());

        a.quality_rating = Some(10);
        a.functionality_rating = Some(11);
        assert!(a.validate().is_err());
    }
}
