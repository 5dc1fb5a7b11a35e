use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::enumerator::enumerate_child_collections;
use super::models::{
    BatchCommitError, CascadeFailure, CascadeOptions, CollectionOutcome, InvocationResult,
    ListingError,
};
use super::progress::{ProgressEvent, ProgressListener};
use crate::store::{CollectionRef, DocumentPath, DocumentRef, DocumentStore, StoreError};


/// Deletes every document of one collection in store-sized atomic batches.
///
/// Batches are never retried and never rolled back: when a commit fails,
/// the batches committed before it stay deleted and the collection's
/// outcome is recorded as incomplete.
pub struct BatchedDeleter<'a> {
    store: &'a dyn DocumentStore,
    options: &'a CascadeOptions,
    progress: &'a dyn ProgressListener,
    parent: &'a DocumentPath,
}

impl<'a> BatchedDeleter<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        options: &'a CascadeOptions,
        progress: &'a dyn ProgressListener,
        parent: &'a DocumentPath,
    ) -> Self {
        Self {
            store,
            options,
            progress,
            parent,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.on_event(&event);
    }

    /// Records the collection's outcome in `result` (nested collections
    /// first when descending) and returns how many of its documents were deleted.
    pub fn delete_collection<'b>(
        &'b self,
        collection: &'b CollectionRef,
        result: &'b mut InvocationResult,
    ) -> BoxFuture<'b, Result<usize, CascadeFailure>> {
        Box::pin(async move {
            self.emit(ProgressEvent::CollectionStarted {
                parent: self.parent.clone(),
                collection: collection.path.clone(),
            });

            let mut outcome = CollectionOutcome::new(&collection.path);
            match self.drain(collection, &mut outcome, result).await {
                Ok(was_empty) => {
                    outcome.complete = true;
                    if was_empty {
                        self.emit(ProgressEvent::CollectionEmpty {
                            parent: self.parent.clone(),
                            collection: collection.path.clone(),
                        });
                    } else {
                        self.emit(ProgressEvent::CollectionCompleted {
                            parent: self.parent.clone(),
                            collection: collection.path.clone(),
                            deleted: outcome.deleted,
                        });
                    }
                    let deleted = outcome.deleted;
                    result.record(outcome);
                    Ok(deleted)
                }
                Err(e) => {
                    warn!(
                        "Stopped {} after deleting {} documents in {} batches: {}",
                        collection.path, outcome.deleted, outcome.batches_committed, e
                    );
                    result.record(outcome);
                    Err(e)
                }
            }
        })
    }

    async fn drain(
        &self,
        collection: &CollectionRef,
        outcome: &mut CollectionOutcome,
        result: &mut InvocationResult,
    ) -> Result<bool, CascadeFailure> {
        let limit = self.options.effective_batch_size(self.store.max_batch_size());
        let listing_error = |source: StoreError| ListingError {
            collection: collection.path.clone(),
            source,
        };

        match self.options.page_size {
            None => {
                let documents = self
                    .store
                    .list_documents(collection)
                    .await
                    .map_err(listing_error)?;
                debug!("Listed {} documents in {}", documents.len(), collection.path);

                if documents.is_empty() {
                    return Ok(true);
                }
                self.process(&documents, limit, outcome, result).await?;
                Ok(false)
            }
            Some(page_size) => {
                let mut page_token: Option<String> = None;
                let mut seen_any = false;

                loop {
                    let page = self
                        .store
                        .list_documents_page(collection, page_size, page_token.as_deref())
                        .await
                        .map_err(listing_error)?;
                    debug!(
                        "Listed page of {} documents in {}",
                        page.documents.len(),
                        collection.path
                    );

                    if page.documents.is_empty() {
                        break;
                    }
                    seen_any = true;
                    self.process(&page.documents, limit, outcome, result).await?;

                    page_token = page.next_page_token;
                    if page_token.is_none() {
                        break;
                    }
                }

                Ok(!seen_any)
            }
        }
    }

    async fn process(
        &self,
        documents: &[DocumentRef],
        limit: usize,
        outcome: &mut CollectionOutcome,
        result: &mut InvocationResult,
    ) -> Result<(), CascadeFailure> {
        if self.options.recursive {
            for document in documents {
                self.purge_descendants(document, result).await?;
            }
        }

        let base_index = outcome.batches_committed;
        let store = self.store;
        let pending: Vec<_> = documents
            .chunks(limit)
            .enumerate()
            .map(move |(offset, chunk)| async move {
                let batch_index = base_index + offset;
                let mut batch = store.new_batch();
                for document in chunk {
                    batch.delete(document);
                }
                let size = batch.len();
                batch
                    .commit()
                    .await
                    .map(|committed| (batch_index, committed))
                    .map_err(|source| (batch_index, size, source))
            })
            .collect();
        let mut commits =
            stream::iter(pending).buffer_unordered(self.options.commit_concurrency.max(1));

        // First failure stops scheduling; in-flight commits are dropped.
        while let Some(commit) = commits.next().await {
            match commit {
                Ok((batch_index, committed)) => {
                    outcome.deleted += committed;
                    outcome.batches_committed += 1;
                    self.emit(ProgressEvent::BatchCommitted {
                        parent: self.parent.clone(),
                        collection: outcome.path.clone(),
                        batch_index,
                        size: committed,
                    });
                }
                Err((batch_index, batch_size, source)) => {
                    return Err(BatchCommitError {
                        collection: outcome.path.clone(),
                        batch_index,
                        batch_size,
                        source,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    async fn purge_descendants(
        &self,
        document: &DocumentRef,
        result: &mut InvocationResult,
    ) -> Result<(), CascadeFailure> {
        let children = enumerate_child_collections(self.store, &document.path)
            .await
            .map_err(CascadeFailure::NestedDiscovery)?;
        for child in &children {
            self.delete_collection(child, result).await?;
        }
        Ok(())
    }
}
