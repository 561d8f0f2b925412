use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::ContentRange;
use thiserror::Error;
use tracing::error;

use crate::RangeNotSatisfiable;

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while resolving or serving media
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("media not found: {id}")]
    NotFound { id: String },

    #[error("requested range not satisfiable for a body of {length} bytes")]
    InvalidRange { length: u64 },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("manifest error: {source}")]
    Manifest {
        #[from]
        source: serde_json::Error,
    },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl MediaError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            MediaError::NotFound { .. } => StatusCode::NOT_FOUND,
            MediaError::InvalidRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RangeNotSatisfiable> for MediaError {
    fn from(err: RangeNotSatisfiable) -> Self {
        let length = err.0.bytes_len().unwrap_or(0);
        MediaError::InvalidRange { length }
    }
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        match self {
            MediaError::NotFound { .. } => (StatusCode::NOT_FOUND, "Not found").into_response(),
            MediaError::InvalidRange { length } => {
                RangeNotSatisfiable(ContentRange::unsatisfied_bytes(length)).into_response()
            }
            err => {
                error!(error = %err, "failed to serve media");
                (err.status(), "Internal server error").into_response()
            }
        }
    }
}
