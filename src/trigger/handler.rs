use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;
use tracing::{error, info, warn};

use super::pattern::PathPattern;
use crate::cascade::{CascadeController, InvocationError, InvocationResult};
use crate::store::DocumentPath;


/// Payload delivered when a document is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDeletedEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub document: DocumentPath,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl DocumentDeletedEvent {
    pub fn new(document: DocumentPath) -> Self {
        Self {
            id: None,
            document,
            time: Some(Utc::now()),
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    FailedPrecondition,
    Internal,
}


#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid event payload: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error("Document {document} does not match trigger pattern {pattern}")]
    Unmatched { document: DocumentPath, pattern: String },

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: InvocationError,
    },
}

impl TriggerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEvent(_) => ErrorCode::InvalidArgument,
            Self::Unmatched { .. } => ErrorCode::FailedPrecondition,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    pub fn invocation(&self) -> Option<&InvocationError> {
        match self {
            Self::Internal { source, .. } => Some(source),
            _ => None,
        }
    }
}


/// Binds a path pattern to a controller and runs exactly one cleanup per
/// matching deletion event.
pub struct CleanupTrigger {
    pattern: PathPattern,
    controller: Arc<CascadeController>,
}

impl CleanupTrigger {
    pub fn new(pattern: PathPattern, controller: Arc<CascadeController>) -> Self {
        info!("CleanupTrigger registered for {}", pattern);
        Self {
            pattern,
            controller,
        }
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub async fn handle(&self, event: &DocumentDeletedEvent) -> Result<InvocationResult, TriggerError> {
        let params: HashMap<String, String> =
            self.pattern
                .captures(&event.document)
                .ok_or_else(|| {
                    warn!("Ignoring deletion of {}: outside {}", event.document, self.pattern);
                    TriggerError::Unmatched {
                        document: event.document.clone(),
                        pattern: self.pattern.to_string(),
                    }
                })?;

        info!(
            event_id = event.id.as_deref().unwrap_or("-"),
            params = ?params,
            "Deletion of {} triggered cleanup",
            event.document
        );

        self.controller.run(&event.document).await.map_err(|e| {
            error!("Cleanup of {} failed: {}", event.document, e);
            TriggerError::Internal {
                message: format!("Failed to clean up {} data", self.pattern.subject()),
                source: e,
            }
        })
    }

    pub async fn handle_json(&self, payload: &str) -> Result<InvocationResult, TriggerError> {
        let event: DocumentDeletedEvent = serde_json::from_str(payload)?;
        self.handle(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionPath, MemoryStore};
    use tokio_test::{assert_err, assert_ok};

    fn trigger(store: &MemoryStore) -> CleanupTrigger {
        let controller = Arc::new(CascadeController::new(Arc::new(store.clone())));
        CleanupTrigger::new(PathPattern::parse("projects/{projectId}").unwrap(), controller)
    }

    #[tokio::test]
    async fn test_matching_event_runs_cleanup() {
        let store = MemoryStore::new();
        store.seed(&CollectionPath::parse("projects/p1/tasks").unwrap(), "t", 3);

        let result = assert_ok!(
            trigger(&store)
                .handle_json(r#"{"id": "evt-1", "document": "projects/p1"}"#)
                .await
        );
        assert_eq!(result.total_deleted, 3);
        assert_eq!(store.total_documents(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_document_is_rejected() {
        let store = MemoryStore::new();
        store.seed(&CollectionPath::parse("users/u1/tasks").unwrap(), "t", 1);

        let event = DocumentDeletedEvent::new(DocumentPath::parse("users/u1").unwrap());
        let err = assert_err!(trigger(&store).handle(&event).await);
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        assert_eq!(store.total_documents(), 1);
    }

    #[tokio::test]
    async fn test_failure_maps_to_internal() {
        let store = MemoryStore::new();
        let parent = DocumentPath::parse("projects/p3").unwrap();
        store.fail_discovery_for(&parent);

        let err = assert_err!(trigger(&store).handle(&DocumentDeletedEvent::new(parent)).await);
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.to_string(), "Failed to clean up project data");
        assert!(err.invocation().unwrap().is_discovery());
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let store = MemoryStore::new();
        let err = assert_err!(trigger(&store).handle_json(r#"{"document": "projects"}"#).await);
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
