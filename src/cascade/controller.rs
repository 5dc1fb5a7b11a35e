use std::sync::Arc;

use tracing::{debug, info};

use super::deleter::BatchedDeleter;
use super::enumerator::enumerate_child_collections;
use super::models::{CascadeFailure, CascadeOptions, InvocationError, InvocationResult, InvocationStatus};
use super::progress::{ProgressEvent, ProgressListener, TracingProgress};
use crate::core::config::CascadeConfig;
use crate::store::{DocumentPath, DocumentStore};


/// Runs one cascading cleanup per deleted parent. Holds no per-invocation
/// state, so one controller can serve concurrent invocations.
pub struct CascadeController {
    store: Arc<dyn DocumentStore>,
    options: CascadeOptions,
    progress: Arc<dyn ProgressListener>,
}

impl CascadeController {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_options(store, CascadeOptions::default())
    }

    pub fn with_options(store: Arc<dyn DocumentStore>, options: CascadeOptions) -> Self {
        info!(
            "Initializing CascadeController (store={}, batch_size={}, recursive={})",
            store.store_name(),
            options.effective_batch_size(store.max_batch_size()),
            options.recursive
        );
        Self {
            store,
            options,
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &CascadeConfig) -> Self {
        Self::with_options(store, CascadeOptions::from(config))
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &CascadeOptions {
        &self.options
    }


    pub async fn run(&self, parent: &DocumentPath) -> Result<InvocationResult, InvocationError> {
        let mut result = InvocationResult::new(parent);
        debug!("Invocation {} started for {}", result.invocation_id, parent);
        self.progress.on_event(&ProgressEvent::InvocationStarted {
            parent: parent.clone(),
        });

        let collections = match enumerate_child_collections(self.store.as_ref(), parent).await {
            Ok(collections) => collections,
            Err(e) => return Err(self.fail(parent, result, e.into())),
        };

        let deleter = BatchedDeleter::new(
            self.store.as_ref(),
            &self.options,
            self.progress.as_ref(),
            parent,
        );

        for collection in &collections {
            let outcome = deleter.delete_collection(collection, &mut result).await;
            if let Err(e) = outcome {
                return Err(self.fail(parent, result, e));
            }
        }

        result.finish(InvocationStatus::Succeeded);
        self.progress.on_event(&ProgressEvent::InvocationSucceeded {
            parent: parent.clone(),
            total_deleted: result.total_deleted,
            collections: result.collections_processed(),
        });
        Ok(result)
    }

    fn fail(
        &self,
        parent: &DocumentPath,
        mut result: InvocationResult,
        cause: CascadeFailure,
    ) -> InvocationError {
        result.finish(InvocationStatus::Failed);
        self.progress.on_event(&ProgressEvent::InvocationFailed {
            parent: parent.clone(),
            total_deleted: result.total_deleted,
            error: cause.to_string(),
        });
        InvocationError {
            parent: parent.clone(),
            result,
            cause,
        }
    }
}
