//! Coordinated commits error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lakelog_meta_store::MetaStoreError;

/// Errors surfaced to coordinated-commits callers.
///
/// None of these are retried server side; writers re-read state and retry.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("{0}")]
    InvalidArgument(String),
    /// Table exists but cannot take part in coordinated commits
    #[error("{0}")]
    PreconditionFailed(String),
    /// Another writer claimed the version first
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// Too many commits awaiting backfill
    #[error("{0}")]
    ResourceExhausted(String),
    #[error("{0}")]
    Internal(String),
}

impl CommitError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::PreconditionFailed(_) => "FAILED_PRECONDITION",
            Self::Conflict(_) => "ALREADY_EXISTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for CommitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "errorCode": self.error_code(),
            "message": self.to_string(),
        });
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<MetaStoreError> for CommitError {
    fn from(e: MetaStoreError) -> Self {
        Self::internal(format!("metadata store: {e}"))
    }
}

impl From<lakelog_common::Error> for CommitError {
    fn from(e: lakelog_common::Error) -> Self {
        use lakelog_common::Error;
        match e {
            Error::TableNotFound(_) => Self::not_found(e.to_string()),
            Error::InvalidTableId(_) => Self::invalid_argument(e.to_string()),
            Error::Configuration(_) => Self::internal(e.to_string()),
        }
    }
}
