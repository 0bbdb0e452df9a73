//! Contains the data models for API requests and responses.

use crate::diff::CategorizedView;
use crate::job::PrintJob;
use crate::service::JobWithDiff;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Returned from creation endpoints.
#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

/// One print job with its parameter diff, as shown in the timeline.
#[derive(Serialize)]
pub struct JobWithDiffResponse {
    #[serde(flatten)]
    pub job: PrintJob,
    pub changed_params: BTreeSet<String>,
    pub parameters: CategorizedView,
}

impl From<JobWithDiff> for JobWithDiffResponse {
    fn from(entry: JobWithDiff) -> Self {
        Self {
            job: entry.job,
            changed_params: entry.changed_params,
            parameters: entry.parameters,
        }
    }
}

#[derive(Deserialize)]
pub struct MaintenanceCreateRequest {
    pub description: String,
    pub todo_tasks: Option<String>,
}

#[derive(Deserialize)]
pub struct MaintenanceUpdateRequest {
    pub description: Option<String>,
    pub todo_tasks: Option<String>,
}
