pub mod handler;
pub mod pattern;

pub use handler::{CleanupTrigger, DocumentDeletedEvent, ErrorCode, TriggerError};
pub use pattern::{PathPattern, PatternError};
