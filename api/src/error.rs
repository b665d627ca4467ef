//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Uses thiserror for domain errors and integrates with tracing for structured logging.

use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (잘못된 요청, 인증 실패, 권한 부족 등)
/// - 서버 에러: 5xx (저장소 오류, 내부 오류)
///
/// 민감한 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Upload rejected: {0}")]
    UploadError(String),

    // ============ 401 Unauthorized ============
    /// 토큰 없음 / 잘못된 토큰 / 만료된 토큰 / 잘못된 자격 증명
    #[error("Authentication failed: {0}")]
    AuthError(String),

    // ============ 403 Forbidden ============
    /// 인증은 됐지만 권한(역할, 소유권)이 없음
    #[error("Not permitted: {0}")]
    Unauthorized(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    // ============ 500 Internal Server Error ============
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal server error")]
    InternalError,

    // ============ 503 Service Unavailable ============
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) | ApiError::UploadError(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::StorageError(_) | ApiError::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg.clone(), None),
            ApiError::ValidationError(msg) => (
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::UploadError(msg) => (
                "UPLOAD_ERROR",
                "Upload rejected".to_string(),
                Some(msg.clone()),
            ),
            ApiError::AuthError(msg) => (
                "AUTH_ERROR",
                "Authentication required".to_string(),
                Some(msg.clone()),
            ),
            ApiError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            ApiError::NotFound(resource) => {
                ("NOT_FOUND", format!("{} not found", resource), None)
            }
            ApiError::Conflict(msg) => ("CONFLICT", msg.clone(), None),
            ApiError::InvalidState(msg) => (
                "INVALID_STATE",
                "Invalid state transition".to_string(),
                Some(msg.clone()),
            ),

            // 5xx 서버 에러
            ApiError::StorageError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Storage error: {:?}", self);
                ("STORAGE_ERROR", "Storage error occurred".to_string(), None)
            }
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                ("INTERNAL_ERROR", "An internal error occurred".to_string(), None)
            }
            ApiError::ServiceUnavailable(service) => (
                "SERVICE_UNAVAILABLE",
                format!("{} is currently unavailable", service),
                None,
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        ApiError::InternalError
    }
}

// ============ Extractor Rejections ============
//
// axum 기본 rejection은 text/plain 본문이므로 ApiError로 바꿔
// 모든 에러가 같은 JSON 형태를 갖도록 한다.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // 필드 누락, 타입 불일치
            JsonRejection::JsonDataError(err) => ApiError::ValidationError(err.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            tracing::error!("Path extraction failed: {}", rejection.body_text());
            return ApiError::InternalError;
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
