//! Error types surfaced at the service edges
//!
//! `ApiError` turns failures into HTTP responses with a `{"error": ...}` body.
//! `AppError` covers start-up and serving failures of the binary.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::cache::{StoreError, UsernameError};
use crate::config::ConfigError;
use crate::resolver::ResolveError;
use crate::upstream::UpstreamError;

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// The username failed validation (400)
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// A required request parameter was absent (400)
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Nothing cached and upstream does not know the user (404)
    #[error("stats not found for {0}")]
    NotFound(String),

    /// Upstream could not provide the profile (500)
    #[error("error fetching data from the API: {0}")]
    Upstream(#[from] UpstreamError),

    /// Local persistence failed (500)
    #[error("error accessing stored stats: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUsername(_) | Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Upstream(err) => Self::Upstream(err),
            ResolveError::Store(err) => Self::Store(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.to_string();
        if status.is_server_error() {
            error!(error = %msg, "request failed");
        }
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

/// Errors that stop the service from starting or serving
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not create upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("server I/O failed: {0}")]
    Io(#[from] io::Error),
}
