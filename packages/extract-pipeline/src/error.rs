//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors; the binary wraps them with `anyhow`.

use thiserror::Error;

/// Errors talking to a record service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, reset, DNS failure and the like
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Base URL cannot address a resource
    #[error("invalid service URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Request exceeded the client timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Service answered with a non-success status
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Body was not the expected JSON shape
    #[error("malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Page size must be at least one record
    #[error("invalid page size {0}")]
    InvalidPageSize(usize),

    /// Walk aborted by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            ClientError::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            ClientError::Http {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Errors writing to or reading from the warehouse.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema and table names must be plain identifiers
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Errors building or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Destination(#[from] DestinationError),

    /// Step graph references an unknown step or contains a cycle
    #[error("invalid step graph: {0}")]
    InvalidGraph(String),

    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
