use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::protocol::Role;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection already joined; its role cannot change.
    #[error("connection already registered as {existing}")]
    AlreadyRegistered { existing: Role },
}

/// Failures surfaced to the uploading client. Never touch relay state.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to create recording directory: {0}")]
    Mkdir(#[source] std::io::Error),

    #[error("failed to write recording: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to read upload body: {0}")]
    Body(#[source] axum::Error),
}

impl UploadError {
    fn code(&self) -> &'static str {
        match self {
            UploadError::Mkdir(_) => "mkdir_failed",
            UploadError::Write(_) | UploadError::Body(_) => "write_failed",
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": self.code() })),
        )
            .into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("missing TLS material: {0} (run mkcert or pass --insecure)")]
    MissingCertificate(String),

    #[error("invalid bind address {0}")]
    BindAddress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
