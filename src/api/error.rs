use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use crate::error::{ApiError, ConfigError, TokenError};

/// Error type of every handler that needs Spotify.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Api(ApiError::Token(err))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        let api = match self {
            AppError::Api(api) => api,
            AppError::Config(_) => return StatusCode::INTERNAL_SERVER_ERROR,
        };
        match api {
            ApiError::Token(e) if e.needs_reauth() => StatusCode::UNAUTHORIZED,
            ApiError::Token(
                TokenError::RefreshContended
                | TokenError::StorageUnavailable(_)
                | TokenError::Interrupted(_),
            ) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Token(TokenError::Cipher(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Token(_) | ApiError::Upstream { .. } | ApiError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "request failed");

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
