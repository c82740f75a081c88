//! Crate-wide error hierarchy for diff-anchor.
//!
//! Goals:
//! - Single root `Error` for all public fallible functions.
//! - Nothing on the diff → position → context path is fatal; these errors
//!   surface only at the edges (config, reading the source tree, model replies,
//!   comment sinks).
//! - Ergonomic `?` via `From` impls.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type AnchorResult<T> = Result<T, Error>;

/// Root error type for the diff-anchor crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration problems (zero budgets, bad concurrency).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the source tree or reference documents failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Model reply could not be turned into review comments.
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// The comment sink refused a comment.
    #[error("sink error: {0}")]
    Sink(String),

    /// A background assembly task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(String),
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{0}` must be greater than 0")]
    ZeroLimit(&'static str),
}

/// Source tree / reference document errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source root does not exist: {0}")]
    MissingRoot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model reply parsing errors.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("no JSON object found in model reply")]
    NoJsonObject,

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ===== Conversions for `?` ergonomics =====

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Source(SourceError::Io(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Reply(ReplyError::Serde(e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Join(e.to_string())
    }
}
