

pub mod config;
pub mod error;

pub use config::CascadeConfig;
pub use error::{CascadeError, Result};
