//! Typed errors for the record service.
//!
//! Handlers return [`ServiceError`], which renders as a JSON body of the
//! form `{"detail": "..."}` with a status code matching the failure class.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised while loading a dataset from its backing store.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No backing file for the dataset
    #[error("Data file {dataset} not found")]
    NotFound { dataset: String },

    /// Backing file exists but could not be decoded
    #[error("failed to read dataset {dataset}: {source}")]
    Parquet {
        dataset: String,
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// Filesystem error
    #[error("I/O error reading dataset {dataset}: {source}")]
    Io {
        dataset: String,
        #[source]
        source: std::io::Error,
    },

    /// Blocking reader task died
    #[error("reader task failed: {0}")]
    Task(String),
}

/// Errors raised while generating seed files.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build record batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("failed to write parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backing dataset for a resource is absent
    #[error("Data file {dataset} not found")]
    DatasetNotFound { dataset: String },

    /// No record matches the requested primary key
    #[error("{0}")]
    RecordNotFound(String),

    /// Out-of-range pagination or malformed filter values
    #[error("{0}")]
    InvalidRequest(String),

    /// Any other dataset load failure
    #[error(transparent)]
    Load(LoadError),
}

impl From<LoadError> for ServiceError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound { dataset } => ServiceError::DatasetNotFound { dataset },
            other => ServiceError::Load(other),
        }
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::DatasetNotFound { .. } | ServiceError::RecordNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Result type alias for service handlers.
pub type Result<T> = std::result::Result<T, ServiceError>;
