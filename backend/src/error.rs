//! Error handling for the pharmacy shift bot servers
//!
//! Provides consistent error responses in Japanese and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Structured diagnostic detail for a failed LINE API call.
///
/// Every field the provider returned is carried explicitly; logging never
/// has to inspect the error at runtime to find out what is present.
#[derive(Debug, Clone, Serialize)]
pub struct LineApiError {
    /// Human-readable summary of the failure
    pub message: String,
    /// HTTP status the provider answered with, if a response arrived
    pub status_code: Option<u16>,
    /// Parsed response body, if one arrived
    pub response_body: Option<serde_json::Value>,
    /// Provider request identifier from the `x-line-request-id` header
    pub request_id: Option<String>,
}

impl LineApiError {
    /// Log each available diagnostic field as its own line
    pub fn log(&self) {
        tracing::error!("LINE API error: {}", self.message);
        if let Some(status) = self.status_code {
            tracing::error!("LINE API error status code: {}", status);
        }
        if let Some(body) = &self.response_body {
            tracing::error!("LINE API error response: {}", body);
        }
        if let Some(request_id) = &self.request_id {
            tracing::error!("LINE API request ID: {}", request_id);
        }
    }
}

impl std::fmt::Display for LineApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(status) = self.status_code {
            write!(f, " (status {})", status)?;
        }
        Ok(())
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Webhook authentication
    #[error("Invalid webhook signature")]
    SignatureInvalid,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Optimistic-concurrency failures
    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Configuration problems surfaced at use time
    #[error("Configuration error: {0}")]
    Configuration(String),

    // External service errors
    #[error("LINE API error: {0}")]
    LineApi(LineApiError),

    #[error("Google Sheets error: {0}")]
    SheetsApi(String),

    #[error("Session store error: {0}")]
    Cache(#[from] redis::RedisError),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_ja: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::SignatureInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_SIGNATURE".to_string(),
                    message_en: "Webhook signature verification failed".to_string(),
                    message_ja: "Webhook署名の検証に失敗しました".to_string(),
                },
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_ja: format!("入力が正しくありません: {}", msg),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_ja: format!("{} が見つかりません", resource),
                },
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_ja: format!("{} は既に更新されています", resource),
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Configuration error: {}", msg),
                    message_ja: format!("設定エラー: {}", msg),
                },
            ),
            AppError::LineApi(detail) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "LINE_API_ERROR".to_string(),
                    message_en: format!("LINE API error: {}", detail),
                    message_ja: format!("LINE APIでエラーが発生しました: {}", detail),
                },
            ),
            AppError::SheetsApi(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "SHEETS_API_ERROR".to_string(),
                    message_en: format!("Google Sheets error: {}", msg),
                    message_ja: format!("Google Sheetsでエラーが発生しました: {}", msg),
                },
            ),
            AppError::Cache(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "SESSION_STORE_ERROR".to_string(),
                    message_en: "A session store error occurred".to_string(),
                    message_ja: "セッションストアでエラーが発生しました".to_string(),
                },
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_ja: "内部エラーが発生しました".to_string(),
                },
            ),
        };

        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_api_error_display() {
        let err = LineApiError {
            message: "push failed".to_string(),
            status_code: Some(401),
            response_body: None,
            request_id: Some("req-123".to_string()),
        };
        assert_eq!(err.to_string(), "push failed (status 401)");

        let bare = LineApiError {
            message: "connect timeout".to_string(),
            status_code: None,
            response_body: None,
            request_id: None,
        };
        assert_eq!(bare.to_string(), "connect timeout");
    }

    #[test]
    fn test_configuration_error_is_not_provider_error() {
        let err = AppError::Configuration("pharmacist channel token is empty".to_string());
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(!matches!(err, AppError::LineApi(_)));
    }
}
