use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use parley_types::api::ErrorResponse;
use parley_types::error::ChatError;

/// REST-boundary error: translates the shared taxonomy (and handler-local
/// validation failures) into a status code plus a structured `{message}`
/// body. Internal detail never reaches the client.
#[derive(Debug)]
pub enum ApiError {
    Chat(ChatError),
    Custom { status: StatusCode, message: String },
}

impl ApiError {
    pub fn custom(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Custom {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Chat(err) => match err {
                ChatError::InvalidToken | ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
                ChatError::Forbidden => StatusCode::FORBIDDEN,
                ChatError::MissingReceiver | ChatError::EmptyContent => StatusCode::BAD_REQUEST,
                ChatError::NotFound => StatusCode::NOT_FOUND,
                ChatError::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Custom { status, .. } => *status,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Chat(err) => err.to_string(),
            Self::Custom { message, .. } => message.clone(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::Chat(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                message: self.message(),
            }),
        )
            .into_response()
    }
}
