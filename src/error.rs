use axum::{
    extract::rejection::StringRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ErrorBody;

/// Failures surfaced at the HTTP boundary.
///
/// Every variant maps to a status code and a JSON `{ error, details?, status? }`
/// body, so handlers can return `Result<_, ApiError>` and never panic.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required fields: {0}")]
    MissingField(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{message}")]
    Provider {
        message: String,
        status: Option<u16>,
        details: Option<String>,
    },

    #[error("{message}")]
    Parse { message: String, raw: String },

    #[error("Failed to communicate with AI service")]
    Transport(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Request body too large")]
    PayloadTooLarge(String),
}

/// Body extraction failures keep the JSON error shape.
impl From<StringRejection> for ApiError {
    fn from(rejection: StringRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Validation(rejection.body_text())
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Configuration(_)
            | ApiError::Provider { .. }
            | ApiError::Parse { .. }
            | ApiError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (details, status) = match self {
            ApiError::Provider {
                status, details, ..
            } => (details.clone(), *status),
            ApiError::Parse { raw, .. } => (Some(raw.clone()), None),
            ApiError::Transport(cause) | ApiError::PayloadTooLarge(cause) => {
                (Some(cause.clone()), None)
            }
            _ => (None, None),
        };

        ErrorBody {
            error: self.to_string(),
            details,
            status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ {} ({})", self, status);
        } else {
            log::warn!("⚠️ {} ({})", self, status);
        }

        (status, Json(self.body())).into_response()
    }
}
