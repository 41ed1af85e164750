//! REST error type and its JSON body.
//!
//! Every failure leaves the API as `{"error": {"code": ..., "message": ...}}` with a status
//! derived from the core error kind. Infrastructure failures are logged here and replaced by a
//! generic message.

use api_shared::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use secu_core::CoreError;
use secu_uuid::UuidError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("business rule violated: {0}")]
    BusinessRule(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::TokenExpired | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::AccessDenied(_) | ApiError::BusinessRule(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) | ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "AUTH_REQUIRED",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::AccessDenied(_) => "ACCESS_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::BusinessRule(_) => "BUSINESS_RULE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
            ApiError::Unauthorized => "Authentication required".to_string(),
            ApiError::TokenExpired => "Token expired, log in again".to_string(),
            ApiError::InvalidCredentials => "Invalid username or password".to_string(),
            ApiError::AccessDenied(detail)
            | ApiError::NotFound(detail)
            | ApiError::BadRequest(detail)
            | ApiError::Conflict(detail)
            | ApiError::InvalidState(detail)
            | ApiError::BusinessRule(detail) => detail.clone(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(m) => ApiError::NotFound(m),
            CoreError::InvalidArgument(m) => ApiError::BadRequest(m),
            CoreError::Conflict(m) => ApiError::Conflict(m),
            CoreError::Forbidden(m) => ApiError::BusinessRule(m),
            CoreError::InvalidState(m) => ApiError::InvalidState(m),
            CoreError::InvalidCredentials => ApiError::InvalidCredentials,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<UuidError> for ApiError {
    fn from(err: UuidError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired => ApiError::TokenExpired,
            AuthError::InvalidToken(_) => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn core_errors_map_to_statuses() {
        let cases = [
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                CoreError::InvalidArgument("x".into()),
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
            ),
            (CoreError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                CoreError::InvalidState("x".into()),
                StatusCode::CONFLICT,
                "INVALID_STATE",
            ),
            (
                CoreError::Forbidden("x".into()),
                StatusCode::FORBIDDEN,
                "BUSINESS_RULE",
            ),
            (
                CoreError::InvalidCredentials,
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
            ),
        ];
        for (core, status, code) in cases {
            let (got_status, json) = body_json(core.into()).await;
            assert_eq!(got_status, status);
            assert_eq!(json["error"]["code"], code);
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, json) = body_json(CoreError::LockPoisoned.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let err = secu_core::RecordId::parse("not-an-id").unwrap_err();
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn expired_token_is_401() {
        let (status, json) = body_json(AuthError::Expired.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
    }
}
