//! Error types for the store and the creation flow
//!
//! Resolution outcomes such as "not found" or "expired" are not errors; see
//! [`crate::resolver::Resolution`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Failure of the underlying persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("corrupt stored data: {0}")]
    Serialization(#[from] serde_json::Error),
}

// redb reports each phase with its own error type; all of them fold into redb::Error.
macro_rules! store_error_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::Storage(err.into())
                }
            }
        )*
    };
}

store_error_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        error!(error = %self, "store operation failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal storage error",
                "code": "storage_error"
            })),
        )
            .into_response()
    }
}

/// Creation-time failures
///
/// `row` is the 1-based position of the offending row in the submitted batch.
/// A failure aborts the rest of the batch; rows saved before it stay saved.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("Row {row}: Invalid URL")]
    InvalidUrl { row: usize },

    #[error("Row {row}: Custom shortcode must be alphanumeric, 3-20 chars")]
    InvalidShortcode { row: usize, shortcode: String },

    #[error("Row {row}: Custom shortcode \"{shortcode}\" already taken")]
    ShortcodeTaken { row: usize, shortcode: String },

    #[error("Row {row}: could not generate a free shortcode after {attempts} attempts")]
    CodeSpaceExhausted { row: usize, attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CreateError {
    /// Row the error refers to, if any
    pub fn row(&self) -> Option<usize> {
        match self {
            CreateError::InvalidUrl { row }
            | CreateError::InvalidShortcode { row, .. }
            | CreateError::ShortcodeTaken { row, .. }
            | CreateError::CodeSpaceExhausted { row, .. } => Some(*row),
            CreateError::Store(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CreateError::InvalidUrl { .. } => "invalid_url",
            CreateError::InvalidShortcode { .. } => "invalid_shortcode",
            CreateError::ShortcodeTaken { .. } => "shortcode_taken",
            CreateError::CodeSpaceExhausted { .. } => "code_space_exhausted",
            CreateError::Store(_) => "storage_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CreateError::InvalidUrl { .. } | CreateError::InvalidShortcode { .. } => {
                StatusCode::BAD_REQUEST
            }
            CreateError::ShortcodeTaken { .. } => StatusCode::CONFLICT,
            CreateError::CodeSpaceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CreateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CreateError {
    fn into_response(self) -> Response {
        if let CreateError::Store(err) = self {
            return err.into_response();
        }

        (
            self.status(),
            Json(json!({
                "error": self.to_string(),
                "code": self.code(),
                "row": self.row()
            })),
        )
            .into_response()
    }
}
