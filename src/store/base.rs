

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::path::{CollectionPath, DocumentPath, PathError};


pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;


#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("Injected failure: {0}")]
    Injected(String),

    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}


/// A collection nested directly under a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
    pub path: CollectionPath,
}

impl CollectionRef {
    pub fn new(path: CollectionPath) -> Self {
        Self { path }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub path: DocumentPath,
}

impl DocumentRef {
    pub fn new(path: DocumentPath) -> Self {
        Self { path }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }
}


#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<DocumentRef>,
    pub next_page_token: Option<String>,
}


/// Pending delete operations committed as one atomic store write.
#[async_trait]
pub trait WriteBatch: Send {
    fn delete(&mut self, document: &DocumentRef);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every enqueued delete or none of them. Returns the number of
    /// operations committed. Deleting an absent document is not an error.
    async fn commit(self: Box<Self>) -> Result<usize, StoreError>;
}


#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_child_collections(
        &self,
        parent: &DocumentPath,
    ) -> Result<Vec<CollectionRef>, StoreError>;

    async fn list_documents(&self, collection: &CollectionRef) -> Result<Vec<DocumentRef>, StoreError>;

    /// One page of a collection's documents. Stores without native paging
    /// return the full listing as a single page.
    async fn list_documents_page(
        &self,
        collection: &CollectionRef,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        let _ = (page_size, page_token);
        Ok(DocumentPage {
            documents: self.list_documents(collection).await?,
            next_page_token: None,
        })
    }

    fn new_batch(&self) -> Box<dyn WriteBatch>;

    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    fn store_name(&self) -> &str;
}


#[async_trait]
impl DocumentStore for Arc<dyn DocumentStore> {
    async fn list_child_collections(
        &self,
        parent: &DocumentPath,
    ) -> Result<Vec<CollectionRef>, StoreError> {
        (**self).list_child_collections(parent).await
    }

    async fn list_documents(&self, collection: &CollectionRef) -> Result<Vec<DocumentRef>, StoreError> {
        (**self).list_documents(collection).await
    }

    async fn list_documents_page(
        &self,
        collection: &CollectionRef,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        (**self)
            .list_documents_page(collection, page_size, page_token)
            .await
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        (**self).new_batch()
    }

    fn max_batch_size(&self) -> usize {
        (**self).max_batch_size()
    }

    fn store_name(&self) -> &str {
        (**self).store_name()
    }
}
