

pub mod cascade;
pub mod core;
pub mod store;
pub mod trigger;


pub use cascade::{
    CascadeController, CascadeOptions, InvocationError, InvocationResult, InvocationStatus,
};
pub use crate::core::config::CascadeConfig;
pub use crate::core::error::{CascadeError, Result};
pub use store::{DocumentPath, DocumentStore, FirestoreStore, MemoryStore};
pub use trigger::{CleanupTrigger, DocumentDeletedEvent, PathPattern};


pub const DEFAULT_TRIGGER_PATTERN: &str = "projects/{projectId}";
