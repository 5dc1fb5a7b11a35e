

pub mod base;
pub mod firestore;
pub mod memory;
pub mod path;

pub use base::{
    CollectionRef, DEFAULT_MAX_BATCH_SIZE, DocumentPage, DocumentRef, DocumentStore, StoreError,
    WriteBatch,
};
pub use firestore::{FirestoreSettings, FirestoreStore};
pub use memory::{CommitRecord, MemoryStore};
pub use path::{CollectionPath, DocumentPath, PathError};
