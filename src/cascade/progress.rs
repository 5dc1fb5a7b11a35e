

use parking_lot::Mutex;
use serde::Serialize;
use strum::IntoStaticStr;
use tracing::{error, info};

use crate::store::{CollectionPath, DocumentPath};


#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProgressEvent {
    InvocationStarted { parent: DocumentPath },
    CollectionStarted { parent: DocumentPath, collection: CollectionPath },
    CollectionEmpty { parent: DocumentPath, collection: CollectionPath },
    BatchCommitted { parent: DocumentPath, collection: CollectionPath, batch_index: usize, size: usize },
    CollectionCompleted { parent: DocumentPath, collection: CollectionPath, deleted: usize },
    InvocationSucceeded { parent: DocumentPath, total_deleted: usize, collections: usize },
    InvocationFailed { parent: DocumentPath, total_deleted: usize, error: String },
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}


pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}


/// Emits the diagnostic lines for each progress point, keyed by parent.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressListener for TracingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::InvocationStarted { parent } => {
                info!(parent = %parent, "{}: Cleaning up child collections", parent);
            }
            ProgressEvent::CollectionStarted { parent, collection } => {
                info!(parent = %parent, "{}: Processing {}", parent, collection.id());
            }
            ProgressEvent::CollectionEmpty { parent, collection } => {
                info!(parent = %parent, "{}: No documents in {}", parent, collection.id());
            }
            ProgressEvent::BatchCommitted {
                parent,
                collection,
                batch_index,
                size,
            } => {
                tracing::debug!(
                    parent = %parent,
                    "{}: Committed batch {} ({} deletes) for {}",
                    parent,
                    batch_index,
                    size,
                    collection
                );
            }
            ProgressEvent::CollectionCompleted {
                parent,
                collection,
                deleted,
            } => {
                info!(parent = %parent, "{}: Deleted {} docs from {}", parent, deleted, collection.id());
            }
            ProgressEvent::InvocationSucceeded { parent, .. } => {
                info!(parent = %parent, "{}: Successfully cleaned up all child collections", parent);
            }
            ProgressEvent::InvocationFailed { parent, error, .. } => {
                error!(parent = %parent, "{}: Cleanup failed: {}", parent, error);
            }
        }
    }
}


/// Keeps every event in order. Useful for tests and for callers that
/// report progress after the invocation returns.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(ProgressEvent::kind).collect()
    }
}

impl ProgressListener for RecordingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}
