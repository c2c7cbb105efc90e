use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Error returned by proxy handlers; rendered as `{"error": ..., ...}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_authenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Not authenticated".to_string(),
            details: None,
        }
    }

    /// GoodX answered with a non-success status that carried no usable JSON.
    pub fn upstream_status(status: StatusCode, content: String) -> Self {
        Self {
            status,
            message: "API returned HTTP error".to_string(),
            details: Some(json!({
                "status_code": status.as_u16(),
                "content": content,
            })),
        }
    }

    pub fn request_failed(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "API request failed".to_string(),
            details: Some(json!({ "details": err.to_string() })),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::request_failed(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, details = ?self.details, "request failed");
        }

        let mut body = json!({ "error": self.message });
        if let (Some(Value::Object(extra)), Some(target)) = (self.details, body.as_object_mut()) {
            target.extend(extra);
        }

        (self.status, Json(body)).into_response()
    }
}
