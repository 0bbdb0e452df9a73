//! Defines the Axum API routes and handlers.

use crate::error::LogbookError;
use crate::job::{Annotation, PrintJob};
use crate::poller::ControllerSnapshot;
use crate::service::{ExportDocument, Logbook};
use crate::store::MaintenanceEvent;
use crate::web::models::{
    CreatedResponse, JobWithDiffResponse, MaintenanceCreateRequest, MaintenanceUpdateRequest,
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

pub type AppState = Arc<Logbook>;

/// Creates the Axum router with all the API endpoints.
pub fn create_router(logbook: AppState) -> Router {
    Router::new()
        .route("/api/prints", get(list_prints).post(create_print))
        .route("/api/prints/{id}/complete", post(complete_print))
        .route("/api/maintenance", get(list_maintenance).post(create_maintenance))
        .route("/api/maintenance/{id}", put(update_maintenance))
        .route("/api/printer_status", get(printer_status))
        .route("/api/export", get(export))
        // Sliced G-code easily exceeds the default body limit
        .layer(DefaultBodyLimit::max(256 * 1024 * 1024))
        .with_state(logbook)
}

/// Handler to list all prints, newest first, with parameter diffs.
async fn list_prints(State(logbook): State<AppState>) -> Json<Vec<JobWithDiffResponse>> {
    let jobs = logbook.list_jobs_with_diff().await;
    Json(jobs.into_iter().map(JobWithDiffResponse::from).collect())
}

/// Handler to log an uploaded G-code file as a new print.
async fn create_print(
    State(logbook): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedResponse>), LogbookError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LogbookError::Validation(e.to_string()))?
    {
        if field.name() == Some("gcode_file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| LogbookError::Validation(e.to_string()))?;
            let job = logbook.create_job(&filename, &bytes).await?;
            return Ok((StatusCode::CREATED, Json(CreatedResponse { id: job.id })));
        }
    }
    Err(LogbookError::Validation("no file uploaded".to_string()))
}

/// Handler to submit the outcome annotation for a print.
async fn complete_print(
    State(logbook): State<AppState>,
    Path(id): Path<Uuid>,
    Json(annotation): Json<Annotation>,
) -> Result<Json<PrintJob>, LogbookError> {
    let job = logbook.complete_job(id, annotation).await?;
    Ok(Json(job))
}

async fn list_maintenance(State(logbook): State<AppState>) -> Json<Vec<MaintenanceEvent>> {
    Json(logbook.list_maintenance().await)
}

async fn create_maintenance(
    State(logbook): State<AppState>,
    Json(request): Json<MaintenanceCreateRequest>,
) -> (StatusCode, Json<CreatedResponse>) {
    let event = logbook
        .create_maintenance(request.description, request.todo_tasks)
        .await;
    (StatusCode::CREATED, Json(CreatedResponse { id: event.id }))
}

async fn update_maintenance(
    State(logbook): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MaintenanceUpdateRequest>,
) -> Result<Json<MaintenanceEvent>, LogbookError> {
    let event = logbook
        .update_maintenance(id, request.description, request.todo_tasks)
        .await?;
    Ok(Json(event))
}

/// Handler for the live connectivity snapshot. Never blocks on network I/O;
/// it only clones what the poller last recorded.
async fn printer_status(State(logbook): State<AppState>) -> Json<ControllerSnapshot> {
    Json(logbook.connectivity_snapshot().await)
}

/// Handler to download the full logbook as a JSON document.
async fn export(
    State(logbook): State<AppState>,
) -> ([(header::HeaderName, &'static str); 1], Json<ExportDocument>) {
    let document = logbook.export().await;
    (
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"printer_logbook_export.json\"",
        )],
        Json(document),
    )
}
