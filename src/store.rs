//! Job and maintenance storage.
//!
//! Durable storage is an external collaborator; the logbook core only
//! depends on the [`JobStore`] seam. The in-memory implementation shipped
//! here serializes writes through a single lock, so concurrent annotations
//! for one job never interleave field-by-field.

use crate::error::LogbookError;
use crate::job::PrintJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: PrintJob);

    async fn get(&self, id: Uuid) -> Option<PrintJob>;

    /// Read-modify-write under the store's lock. The closure runs at most
    /// once; `JobNotFound` if the id is unknown.
    async fn update_with(
        &self,
        id: Uuid,
        apply: Box<dyn for<'a> FnOnce(&'a mut PrintJob) + Send + 'static>,
    ) -> Result<PrintJob, LogbookError>;

    async fn all(&self) -> Vec<PrintJob>;
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, PrintJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: PrintJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get(&self, id: Uuid) -> Option<PrintJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn update_with(
        &self,
        id: Uuid,
        apply: Box<dyn for<'a> FnOnce(&'a mut PrintJob) + Send + 'static>,
    ) -> Result<PrintJob, LogbookError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(LogbookError::JobNotFound(id))?;
        apply(job);
        Ok(job.clone())
    }

    async fn all(&self) -> Vec<PrintJob> {
        self.jobs.read().await.values().cloned().collect()
    }
}

/// A single maintenance log entry (nozzle swap, belt tension, ...).
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceEvent {
    pub id: Uuid,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub todo_tasks: Option<String>,
}

/// Plain CRUD log of maintenance events. No diffing, no lifecycle.
#[derive(Default)]
pub struct MaintenanceLog {
    events: RwLock<Vec<MaintenanceEvent>>,
}

impl MaintenanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, description: String, todo_tasks: Option<String>) -> MaintenanceEvent {
        let event = MaintenanceEvent {
            id: Uuid::new_v4(),
            description,
            timestamp: Utc::now(),
            todo_tasks,
        };
        self.events.write().await.push(event.clone());
        event
    }

    /// All events, newest first.
    pub async fn list(&self) -> Vec<MaintenanceEvent> {
        let mut events = self.events.read().await.clone();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
    }

    pub async fn update(
        &self,
        id: Uuid,
        description: Option<String>,
        todo_tasks: Option<String>,
    ) -> Result<MaintenanceEvent, LogbookError> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LogbookError::MaintenanceNotFound(id))?;
        if let Some(description) = description {
            event.description = description;
        }
        if let Some(todo_tasks) = todo_tasks {
            event.todo_tasks = Some(todo_tasks);
        }
        Ok(event.clone())
    }
}
