use tracing::{debug, warn};

use super::models::DiscoveryError;
use crate::store::{CollectionRef, DocumentPath, DocumentStore};


/// Lists the collections nested directly under `parent`. The parent itself
/// may already be gone; only its path is used.
pub async fn enumerate_child_collections(
    store: &dyn DocumentStore,
    parent: &DocumentPath,
) -> Result<Vec<CollectionRef>, DiscoveryError> {
    debug!("Listing child collections of {} via {}", parent, store.store_name());

    match store.list_child_collections(parent).await {
        Ok(collections) => {
            debug!("Found {} child collections under {}", collections.len(), parent);
            Ok(collections)
        }
        Err(e) => {
            warn!("Could not list child collections of {}: {}", parent, e);
            Err(DiscoveryError {
                parent: parent.clone(),
                source: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionPath, MemoryStore};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_empty_parent_is_not_an_error() {
        let store = MemoryStore::new();
        let parent = DocumentPath::parse("projects/ghost").unwrap();

        let collections = assert_ok!(enumerate_child_collections(&store, &parent).await);
        assert!(collections.is_empty());
    }

    #[tokio::test]
    async fn test_does_not_descend() {
        let store = MemoryStore::new();
        store.insert(&DocumentPath::parse("projects/p1/tasks/t1").unwrap());
        store.create_collection(&CollectionPath::parse("projects/p1/tasks/t1/comments").unwrap());
        let parent = DocumentPath::parse("projects/p1").unwrap();

        let collections = assert_ok!(enumerate_child_collections(&store, &parent).await);
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].id(), "tasks");
    }

    #[tokio::test]
    async fn test_listing_failure_becomes_discovery_error() {
        let store = MemoryStore::new();
        let parent = DocumentPath::parse("projects/p3").unwrap();
        store.fail_discovery_for(&parent);

        let err = assert_err!(enumerate_child_collections(&store, &parent).await);
        assert_eq!(err.parent, parent);
    }
}
