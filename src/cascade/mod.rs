pub mod controller;
pub mod deleter;
pub mod enumerator;
pub mod models;
pub mod progress;


pub use controller::CascadeController;
pub use deleter::BatchedDeleter;
pub use enumerator::enumerate_child_collections;
pub use models::{
    BatchCommitError, CascadeFailure, CascadeOptions, CollectionOutcome, DiscoveryError,
    InvocationError, InvocationResult, InvocationStatus, ListingError,
};
pub use progress::{ProgressEvent, ProgressListener, RecordingProgress, TracingProgress};
