use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;
use uuid::Uuid;

use crate::core::config::CascadeConfig;
use crate::store::{CollectionPath, DEFAULT_MAX_BATCH_SIZE, DocumentPath, StoreError};


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOptions {
    pub max_batch_size: usize,
    pub page_size: Option<usize>,
    pub commit_concurrency: usize,
    pub recursive: bool,
}

impl CascadeOptions {
    /// Batch size actually used against a store advertising `store_limit`.
    pub fn effective_batch_size(&self, store_limit: usize) -> usize {
        self.max_batch_size.min(store_limit).max(1)
    }
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            page_size: None,
            commit_concurrency: 1,
            recursive: false,
        }
    }
}

impl From<&CascadeConfig> for CascadeOptions {
    fn from(config: &CascadeConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            page_size: config.page_size,
            commit_concurrency: config.commit_concurrency,
            recursive: config.recursive,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvocationStatus {
    Running,
    Succeeded,
    Failed,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub collection_id: String,
    pub path: CollectionPath,
    pub deleted: usize,
    pub batches_committed: usize,
    /// False when processing stopped part-way through this collection.
    pub complete: bool,
}

impl CollectionOutcome {
    pub fn new(path: &CollectionPath) -> Self {
        Self {
            collection_id: path.id().to_string(),
            path: path.clone(),
            deleted: 0,
            batches_committed: 0,
            complete: false,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub invocation_id: Uuid,
    pub parent: DocumentPath,
    pub status: InvocationStatus,
    pub collections: Vec<CollectionOutcome>,
    pub total_deleted: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InvocationResult {
    pub fn new(parent: &DocumentPath) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            parent: parent.clone(),
            status: InvocationStatus::Running,
            collections: Vec::new(),
            total_deleted: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record(&mut self, outcome: CollectionOutcome) {
        self.total_deleted += outcome.deleted;
        self.collections.push(outcome);
    }

    pub fn finish(&mut self, status: InvocationStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }

    pub fn collections_processed(&self) -> usize {
        self.collections.len()
    }

    pub fn total_batches(&self) -> usize {
        self.collections.iter().map(|c| c.batches_committed).sum()
    }

    /// Deleted count for a direct child collection of the parent.
    pub fn deleted_in(&self, collection_id: &str) -> Option<usize> {
        self.outcome(collection_id).map(|c| c.deleted)
    }

    pub fn outcome(&self, collection_id: &str) -> Option<&CollectionOutcome> {
        self.collections
            .iter()
            .find(|c| c.collection_id == collection_id && c.path.parent().as_ref() == Some(&self.parent))
    }

    pub fn outcome_at(&self, path: &CollectionPath) -> Option<&CollectionOutcome> {
        self.collections.iter().find(|c| &c.path == path)
    }
}


#[derive(Debug, Error)]
#[error("Failed to list child collections of {parent}: {source}")]
pub struct DiscoveryError {
    pub parent: DocumentPath,
    #[source]
    pub source: StoreError,
}


#[derive(Debug, Error)]
#[error("Failed to list documents of {collection}: {source}")]
pub struct ListingError {
    pub collection: CollectionPath,
    #[source]
    pub source: StoreError,
}


#[derive(Debug, Error)]
#[error("Failed to commit batch {batch_index} of {collection} ({batch_size} deletes): {source}")]
pub struct BatchCommitError {
    pub collection: CollectionPath,
    /// Zero-based position of the failed batch within the collection.
    pub batch_index: usize,
    pub batch_size: usize,
    #[source]
    pub source: StoreError,
}


#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CascadeFailure {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Listing the child collections of a document inside a child
    /// collection failed, after deletions may already have happened.
    #[error(transparent)]
    NestedDiscovery(DiscoveryError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    BatchCommit(#[from] BatchCommitError),
}

impl CascadeFailure {
    pub fn stage(&self) -> &'static str {
        self.into()
    }
}


/// The single failure reported for an invocation. Carries the partial
/// result accumulated before processing stopped.
#[derive(Debug, Error)]
#[error("Cascade cleanup of {parent} failed after deleting {} documents across {} collections: {cause}", .result.total_deleted, .result.collections.len())]
pub struct InvocationError {
    pub parent: DocumentPath,
    pub result: InvocationResult,
    #[source]
    pub cause: CascadeFailure,
}

impl InvocationError {
    /// True when the children could not even be discovered.
    pub fn is_discovery(&self) -> bool {
        matches!(self.cause, CascadeFailure::Discovery(_))
    }

    pub fn is_batch_commit(&self) -> bool {
        matches!(self.cause, CascadeFailure::BatchCommit(_))
    }

    pub fn partial_result(&self) -> &InvocationResult {
        &self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_accounting() {
        let parent = DocumentPath::parse("projects/p1").unwrap();
        let mut result = InvocationResult::new(&parent);

        let mut tasks = CollectionOutcome::new(&parent.collection("tasks").unwrap());
        tasks.deleted = 3;
        tasks.batches_committed = 1;
        tasks.complete = true;
        result.record(tasks);

        let nested = parent
            .collection("tasks")
            .unwrap()
            .document("t1")
            .unwrap()
            .collection("tasks")
            .unwrap();
        let mut deep = CollectionOutcome::new(&nested);
        deep.deleted = 2;
        result.record(deep);

        assert_eq!(result.total_deleted, 5);
        assert_eq!(result.deleted_in("tasks"), Some(3));
        assert_eq!(result.outcome_at(&nested).map(|c| c.deleted), Some(2));
        assert_eq!(result.total_batches(), 1);
        assert_eq!(result.status, InvocationStatus::Running);

        result.finish(InvocationStatus::Succeeded);
        assert!(result.is_success());
        assert!(result.completed_at.is_some());
    }

    #[test]
    fn test_effective_batch_size() {
        let options = CascadeOptions::default();
        assert_eq!(options.effective_batch_size(500), 500);
        assert_eq!(options.effective_batch_size(200), 200);

        let small = CascadeOptions {
            max_batch_size: 50,
            ..Default::default()
        };
        assert_eq!(small.effective_batch_size(500), 50);
    }

    #[test]
    fn test_failure_stage_names() {
        let failure = CascadeFailure::Discovery(DiscoveryError {
            parent: DocumentPath::parse("projects/p3").unwrap(),
            source: StoreError::Unavailable("down".to_string()),
        });
        assert_eq!(failure.stage(), "discovery");
        let nested = CascadeFailure::NestedDiscovery(DiscoveryError {
            parent: DocumentPath::parse("projects/p3/tasks/t1").unwrap(),
            source: StoreError::Unavailable("down".to_string()),
        });
        assert_eq!(nested.stage(), "nested_discovery");
        assert_eq!(InvocationStatus::Succeeded.to_string(), "succeeded");
    }
}
