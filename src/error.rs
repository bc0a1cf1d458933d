//! Error type shared by the handlers and the HTTP layer.
//!
//! Every error response has the body `{"code": <status>, "error": <message>}`.
//! Collaborators return `anyhow::Result`; an [`ApiError`] raised inside a
//! collaborator survives the trip through `anyhow` and is recovered here by
//! downcast. Anything else is reported as an internal error.

use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("id '{0}' not supported")]
    UnsupportedId(String),

    #[error("must specify search term")]
    MissingSearchTerm,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("access to '{0}' denied")]
    AccessDenied(String),

    #[error("tree '{0}' not found")]
    UnknownTree(String),

    #[error("record '{0}' not found")]
    NotFound(String),

    #[error("route '{0}' not found")]
    UnknownRoute(String),

    #[error("record '{xref}' is malformed: {reason}")]
    MalformedRecord { xref: String, reason: String },

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedId(_)
            | ApiError::MissingSearchTerm
            | ApiError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::UnknownTree(_) | ApiError::NotFound(_) | ApiError::UnknownRoute(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::MalformedRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.status().as_u16(),
            error: self.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => api,
            Err(other) => ApiError::Internal(other),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidPath(rejection.body_text())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref cause) = self {
            tracing::error!(error = %format!("{:#}", cause), "request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}
