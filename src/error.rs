use crate::types::RunStatus;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type WebResult<T> = std::result::Result<T, WebError>;

/// Failures surfaced to the browser as a JSON `{ "error": ... }` body.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Run failed with status: {0}")]
    RunFailed(RunStatus),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    BadRequest(String),

    /// A request body the JSON extractor refused; keeps its 400/415/422 status.
    #[error("{0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("Failed to read system prompt")]
    SystemPrompt(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for WebError {
    fn from(error: anyhow::Error) -> Self {
        Self::Provider(format!("{error:#}"))
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBody(rejection) => rejection.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
