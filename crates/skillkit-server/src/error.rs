use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use skillkit_core::SkillkitError;
use tracing::warn;

/// An error returned to HTTP clients as `{ "error": ..., "kind": ... }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn no_match(query: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "no_match",
            format!("no skill matched the query '{query}'"),
        )
    }
}

/// HTTP status for each error category.
pub fn status_for(err: &SkillkitError) -> StatusCode {
    match err {
        SkillkitError::SkillNotFound(_) | SkillkitError::HandlerNotFound(_) => StatusCode::NOT_FOUND,
        SkillkitError::AccessDenied(_) => StatusCode::FORBIDDEN,
        SkillkitError::InvalidInput(_)
        | SkillkitError::Descriptor { .. }
        | SkillkitError::InvalidTimezone(_)
        | SkillkitError::Calendar(_) => StatusCode::BAD_REQUEST,
        SkillkitError::Resource { reason, .. } if reason.contains("not found") => StatusCode::NOT_FOUND,
        SkillkitError::Resource { .. } => StatusCode::BAD_REQUEST,
        SkillkitError::LlmProvider(_) => StatusCode::BAD_GATEWAY,
        SkillkitError::MissingCredentials(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SkillkitError> for ApiError {
    fn from(err: SkillkitError) -> Self {
        Self::new(status_for(&err), err.kind(), err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        SkillkitError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, kind = self.kind, error = %self.message, "request failed");
        }
        let body = json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}
