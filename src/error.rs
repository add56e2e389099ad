//! # 에러 처리 모듈
//!
//! 요청 처리 중 발생할 수 있는 모든 에러 타입을 정의합니다.
//! Rust에서는 예외(exception) 대신 `Result<T, E>` 타입으로 에러를 처리합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 요청을 중단시키는 에러를 하나의 타입으로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답으로 자동 변환
//!
//! 프레임 단위 실패(이미지/오디오 생성 실패)는 여기까지 올라오지 않습니다.
//! 파이프라인 내부에서 "건너뛰고 계속"으로 처리되고, 결과는 성공 개수로 보고됩니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// 요청을 실패시키는 에러 종류
///
/// 각 variant는 적절한 HTTP 상태 코드와 메시지로 변환됩니다.
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 자동으로 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 잘못된 요청 (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 콘텐츠 수집 결과가 최소 길이에 못 미침 (HTTP 422)
    ///
    /// 진단을 위해 실제로 추출한 길이를 함께 전달합니다 (0일 수도 있음).
    #[error("Not enough readable content could be extracted from the source ({extracted_bytes} bytes)")]
    InsufficientContent { extracted_bytes: usize },

    /// 생성 서비스가 쓸 수 있는 결과를 돌려주지 않음 (HTTP 502)
    ///
    /// 스토리보드 합성처럼 결과 없이는 진행할 수 없는 단계에서만 사용합니다.
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// 요청이 끝나기 전에 취소됨: 클라이언트 연결 종료나 서버 종료 (HTTP 503)
    #[error("Request was cancelled before it completed")]
    Cancelled,

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from]: sqlx::Error → AppError::Database 자동 변환 (`?` 연산자로 전파 가능)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 파일 입출력 오류 (HTTP 500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// 응답 본문의 `error.code` 값
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::InsufficientContent { .. } => "insufficient_content",
            AppError::Upstream(_) => "upstream_error",
            AppError::Cancelled => "request_cancelled",
            AppError::Internal(_) => "internal_error",
            AppError::Database(_) => "database_error",
            AppError::Io(_) => "io_error",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON serialization failed: {}", err))
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, IO, Internal)는 실제 에러 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let code = self.code();
        // (상태 코드, 메시지, 추가 진단 정보) 튜플
        let (status, message, details): (StatusCode, String, Option<Value>) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::InsufficientContent { extracted_bytes } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                self.to_string(),
                Some(json!({ "extracted_bytes": extracted_bytes })),
            ),
            AppError::Upstream(ref msg) => {
                tracing::warn!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone(), None)
            }
            AppError::Cancelled => {
                tracing::info!("request cancelled");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), None)
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An IO error occurred".to_string(),
                    None,
                )
            }
        };

        // 결과: { "error": { "code": "...", "message": "...", "details": {...} } }
        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insufficient_content_maps_to_422() {
        let response = AppError::InsufficientContent { extracted_bytes: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn cancellation_is_not_reported_as_a_server_fault() {
        let response = AppError::Cancelled.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::Cancelled.code(), "request_cancelled");
    }

    #[test]
    fn internal_errors_keep_codes_distinct() {
        assert_eq!(AppError::NotFound.code(), "not_found");
        assert_eq!(AppError::Upstream("x".into()).code(), "upstream_error");
        assert_eq!(
            AppError::InsufficientContent { extracted_bytes: 0 }.code(),
            "insufficient_content"
        );
    }
}
