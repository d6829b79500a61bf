//! Error types for fruitstore-core

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using fruitstore Error
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors raised outside the dispatch path.
///
/// Validation failures of tool calls never surface here; they are reported
/// to the caller as error payloads (see [`crate::store::StoreError`]).
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(fruitstore::config))]
    Config(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(fruitstore::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(fruitstore::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(fruitstore::toml))]
    Toml(#[from] toml::de::Error),
}
