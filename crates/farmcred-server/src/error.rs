use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use farmcred_types::FarmCredError;

/// Error body returned by every API route: `{"error": code, "message": text}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FarmCredError> for ApiError {
    fn from(err: FarmCredError) -> Self {
        let (status, code) = match &err {
            FarmCredError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            FarmCredError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            FarmCredError::NotFound(_) | FarmCredError::AgentNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            FarmCredError::ExternalService(_) => {
                (StatusCode::BAD_GATEWAY, "external_service_error")
            }
            FarmCredError::Storage(_) | FarmCredError::Serialization(_) => {
                tracing::error!(%err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}
