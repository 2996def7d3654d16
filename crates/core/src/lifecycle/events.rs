//! # Change Notifications
//!
//! After a successful write the engine publishes a [`ProjectEvent`] so
//! connected clients can refresh without polling. Delivery is best-effort:
//! a failed publish is logged and dropped, never rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use super::error::NotificationError;
use super::status::Phase;

/// Kind of project event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectEventKind {
    ProjectCreated,
    /// A phase or the kit purchase was written
    ProjectUpdated,
    ProjectDeleted,
    DocumentAdded,
    DocumentRemoved,
}

/// Part of the project an update touched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateScope {
    Commercial,
    Technical,
    Installation,
    Homologation,
    Kit,
}

impl From<Phase> for UpdateScope {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Commercial => Self::Commercial,
            Phase::Technical => Self::Technical,
            Phase::Installation => Self::Installation,
            Phase::Homologation => Self::Homologation,
        }
    }
}

/// An event on the shared broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ProjectEventKind,
    pub project_id: i64,
    #[serde(default)]
    pub scope: Option<UpdateScope>,
}

impl ProjectEvent {
    pub fn new(kind: ProjectEventKind, project_id: i64) -> Self {
        Self {
            id: next_event_id(),
            timestamp: Utc::now(),
            kind,
            project_id,
            scope: None,
        }
    }

    /// A `project_updated` event for one phase or the kit
    pub fn updated(project_id: i64, scope: impl Into<UpdateScope>) -> Self {
        Self::new(ProjectEventKind::ProjectUpdated, project_id).with_scope(scope.into())
    }

    pub fn with_scope(mut self, scope: UpdateScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Time-ordered event id, unique within the process
fn next_event_id() -> String {
    let seq = EVENT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("evt-{:x}-{:x}", Utc::now().timestamp_micros(), seq)
}

/// Broadcast collaborator
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ProjectEvent) -> Result<(), NotificationError>;
}

/// [`EventSink`] over a tokio broadcast channel
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ProjectEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn from_sender(tx: broadcast::Sender<ProjectEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: ProjectEvent) -> Result<(), NotificationError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| NotificationError::NoSubscribers)
    }
}

/// Publish `event`, logging and swallowing any failure
pub fn emit(sink: &dyn EventSink, event: ProjectEvent) {
    let project_id = event.project_id;
    let kind = event.kind;
    if let Err(e) = sink.publish(event) {
        tracing::warn!(project_id, ?kind, "Event not delivered: {}", e);
    }
}
