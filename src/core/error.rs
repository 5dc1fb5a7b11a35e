

use thiserror::Error;


#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),
}


pub type Result<T> = std::result::Result<T, CascadeError>;
