

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::base::{
    CollectionRef, DEFAULT_MAX_BATCH_SIZE, DocumentPage, DocumentRef, DocumentStore, StoreError,
    WriteBatch,
};
use super::path::{CollectionPath, DocumentPath};


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub collections: Vec<CollectionPath>,
    pub size: usize,
}


#[derive(Default)]
struct State {
    collections: BTreeMap<CollectionPath, BTreeSet<String>>,
    fail_discovery: BTreeSet<DocumentPath>,
    fail_listing: BTreeSet<CollectionPath>,
    // collection -> 1-based index of the commit touching it that should fail
    fail_commit: HashMap<CollectionPath, usize>,
    commits_seen: HashMap<CollectionPath, usize>,
    commit_log: Vec<CommitRecord>,
}


/// In-process hierarchical store. Collections are keyed by full path, so
/// removing a document leaves the collections nested beneath it in place.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    max_batch_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_batch_limit(DEFAULT_MAX_BATCH_SIZE)
    }

    pub fn with_batch_limit(max_batch_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            max_batch_size,
        }
    }


    pub fn create_collection(&self, collection: &CollectionPath) {
        self.state
            .lock()
            .collections
            .entry(collection.clone())
            .or_default();
    }


    pub fn insert(&self, document: &DocumentPath) {
        self.state
            .lock()
            .collections
            .entry(document.parent())
            .or_default()
            .insert(document.id().to_string());
    }

    /// Inserts `count` documents named `<prefix>0000`, `<prefix>0001`, ...
    pub fn seed(&self, collection: &CollectionPath, prefix: &str, count: usize) {
        let mut state = self.state.lock();
        let ids = state.collections.entry(collection.clone()).or_default();
        for i in 0..count {
            ids.insert(format!("{}{:04}", prefix, i));
        }
    }

    pub fn contains(&self, document: &DocumentPath) -> bool {
        self.state
            .lock()
            .collections
            .get(&document.parent())
            .is_some_and(|ids| ids.contains(document.id()))
    }

    pub fn document_count(&self, collection: &CollectionPath) -> usize {
        self.state
            .lock()
            .collections
            .get(collection)
            .map_or(0, BTreeSet::len)
    }

    pub fn total_documents(&self) -> usize {
        self.state.lock().collections.values().map(BTreeSet::len).sum()
    }


    pub fn fail_discovery_for(&self, parent: &DocumentPath) {
        self.state.lock().fail_discovery.insert(parent.clone());
    }

    pub fn fail_listing_for(&self, collection: &CollectionPath) {
        self.state.lock().fail_listing.insert(collection.clone());
    }

    /// Makes the `nth` (1-based) commit that touches `collection` fail.
    pub fn fail_commit_for(&self, collection: &CollectionPath, nth: usize) {
        self.state.lock().fail_commit.insert(collection.clone(), nth);
    }


    pub fn commit_log(&self) -> Vec<CommitRecord> {
        self.state.lock().commit_log.clone()
    }

    pub fn commits_for(&self, collection: &CollectionPath) -> Vec<usize> {
        self.state
            .lock()
            .commit_log
            .iter()
            .filter(|record| record.collections.contains(collection))
            .map(|record| record.size)
            .collect()
    }

    fn commit_deletes(&self, deletes: &[DocumentPath]) -> Result<usize, StoreError> {
        let mut state = self.state.lock();

        let touched: BTreeSet<CollectionPath> = deletes.iter().map(DocumentPath::parent).collect();
        for collection in &touched {
            let seen = state.commits_seen.entry(collection.clone()).or_insert(0);
            *seen += 1;
            let seen = *seen;
            if state.fail_commit.get(collection) == Some(&seen) {
                debug!("Injected commit failure for {} (commit {})", collection, seen);
                return Err(StoreError::Injected(format!(
                    "commit {} for {} rejected",
                    seen, collection
                )));
            }
        }

        for document in deletes {
            if let Some(ids) = state.collections.get_mut(&document.parent()) {
                ids.remove(document.id());
            }
        }
        state.commit_log.push(CommitRecord {
            collections: touched.into_iter().collect(),
            size: deletes.len(),
        });

        Ok(deletes.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}


struct MemoryBatch {
    store: MemoryStore,
    deletes: Vec<DocumentPath>,
}

#[async_trait]
impl WriteBatch for MemoryBatch {
    fn delete(&mut self, document: &DocumentRef) {
        self.deletes.push(document.path.clone());
    }

    fn len(&self) -> usize {
        self.deletes.len()
    }

    async fn commit(self: Box<Self>) -> Result<usize, StoreError> {
        if self.deletes.is_empty() {
            return Ok(0);
        }
        self.store.commit_deletes(&self.deletes)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_child_collections(
        &self,
        parent: &DocumentPath,
    ) -> Result<Vec<CollectionRef>, StoreError> {
        let state = self.state.lock();
        if state.fail_discovery.contains(parent) {
            return Err(StoreError::Injected(format!(
                "listing collections of {} rejected",
                parent
            )));
        }

        let depth = parent.segments().len() + 1;
        let collections = state
            .collections
            .keys()
            .filter(|path| path.segments().len() == depth && path.parent().as_ref() == Some(parent))
            .cloned()
            .map(CollectionRef::new)
            .collect();
        Ok(collections)
    }

    async fn list_documents(&self, collection: &CollectionRef) -> Result<Vec<DocumentRef>, StoreError> {
        let page = self.list_documents_page(collection, usize::MAX, None).await?;
        Ok(page.documents)
    }

    async fn list_documents_page(
        &self,
        collection: &CollectionRef,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        let state = self.state.lock();
        if state.fail_listing.contains(&collection.path) {
            return Err(StoreError::Injected(format!(
                "listing documents of {} rejected",
                collection.path
            )));
        }

        let Some(ids) = state.collections.get(&collection.path) else {
            return Ok(DocumentPage::default());
        };

        // The token is the last id handed out, so pages stay valid while
        // earlier documents are being deleted.
        let mut remaining = ids
            .iter()
            .filter(|id| page_token.is_none_or(|token| id.as_str() > token));

        let mut documents = Vec::new();
        for id in remaining.by_ref().take(page_size.max(1)) {
            documents.push(DocumentRef::new(collection.path.document(id)?));
        }

        let next_page_token = if remaining.next().is_some() {
            documents.last().map(|doc| doc.id().to_string())
        } else {
            None
        };

        Ok(DocumentPage {
            documents,
            next_page_token,
        })
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemoryBatch {
            store: self.clone(),
            deletes: Vec::new(),
        })
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(raw: &str) -> DocumentPath {
        DocumentPath::parse(raw).unwrap()
    }

    fn col(raw: &str) -> CollectionPath {
        CollectionPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_lists_direct_children_only() {
        let store = MemoryStore::new();
        store.insert(&doc("projects/p1/tasks/t1"));
        store.insert(&doc("projects/p1/tasks/t1/comments/c1"));
        store.create_collection(&col("projects/p1/notes"));
        store.insert(&doc("projects/p2/tasks/t9"));

        let children = store.list_child_collections(&doc("projects/p1")).await.unwrap();
        let ids: Vec<&str> = children.iter().map(CollectionRef::id).collect();
        assert_eq!(ids, vec!["notes", "tasks"]);
    }

    #[tokio::test]
    async fn test_batch_commit_is_idempotent() {
        let store = MemoryStore::new();
        store.insert(&doc("projects/p1/tasks/t1"));

        let target = DocumentRef::new(doc("projects/p1/tasks/t1"));
        let mut batch = store.new_batch();
        batch.delete(&target);
        batch.delete(&target);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.commit().await.unwrap(), 2);
        assert!(!store.contains(&target.path));

        let mut again = store.new_batch();
        again.delete(&target);
        assert_eq!(again.commit().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_paging_survives_deletes() {
        let store = MemoryStore::new();
        let items = col("projects/p1/items");
        store.seed(&items, "i", 5);
        let items_ref = CollectionRef::new(items.clone());

        let first = store.list_documents_page(&items_ref, 2, None).await.unwrap();
        assert_eq!(first.documents.len(), 2);
        let token = first.next_page_token.clone().unwrap();

        let mut batch = store.new_batch();
        for document in &first.documents {
            batch.delete(document);
        }
        batch.commit().await.unwrap();

        let second = store
            .list_documents_page(&items_ref, 2, Some(&token))
            .await
            .unwrap();
        assert_eq!(second.documents[0].id(), "i0002");

        let last = store
            .list_documents_page(&items_ref, 2, Some("i0003"))
            .await
            .unwrap();
        assert_eq!(last.documents.len(), 1);
        assert!(last.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_is_atomic() {
        let store = MemoryStore::new();
        let items = col("projects/p1/items");
        store.seed(&items, "i", 3);
        store.fail_commit_for(&items, 1);

        let listing = store.list_documents(&CollectionRef::new(items.clone())).await.unwrap();
        let mut batch = store.new_batch();
        for document in &listing {
            batch.delete(document);
        }
        assert!(batch.commit().await.is_err());
        assert_eq!(store.document_count(&items), 3);
        assert!(store.commit_log().is_empty());
    }
}
