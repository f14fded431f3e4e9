//! Error types for treescout.
//!
//! Only a handful of conditions are ever surfaced to a caller: a query that
//! cannot be searched for, a configuration that cannot be loaded, or a worker
//! pool that cannot be built. Everything that goes wrong while walking the
//! tree (a directory that vanished, a file we may not open, bytes that are
//! not UTF-8) is absorbed by the engine and contributes nothing to the
//! results, so those variants only escape from the standalone helpers.
//!
//! ```rust,ignore
//! match manager.start_search("todo", "/src", SearchOptions::default()) {
//!     Ok(generation) => // watch the event channel for `generation`,
//!     Err(SearchError::InvalidQuery(q)) => // nothing to search for,
//!     Err(e) => // other errors
//! }
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while configuring or running a search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0:?}")]
    InvalidQuery(String),
    #[error("Root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Worker pool error: {0}")]
    PoolError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid UTF-8 in file {}: {source}", .path.display())]
    EncodingError {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
}

impl SearchError {
    pub fn invalid_query(query: impl Into<String>) -> Self {
        Self::InvalidQuery(query.into())
    }

    pub fn root_not_found(path: impl Into<PathBuf>) -> Self {
        Self::RootNotFound(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn pool_error(msg: impl Into<String>) -> Self {
        Self::PoolError(msg.into())
    }

    pub fn encoding_error(path: &Path, source: std::str::Utf8Error) -> Self {
        Self::EncodingError {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for SearchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::PoolError(err.to_string())
    }
}
