//! # 헬스체크(Health Check) 핸들러
//!
//! 서버가 정상적으로 동작하는지 확인하는 엔드포인트입니다.
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok", "sessions": 3 }`
//!
//! `sessions`는 현재 메모리에 있는 진행 중 세션 수입니다.
//! 정리 작업(sweeper)이 제대로 돌고 있는지 모니터링할 때 씁니다.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::AppState;

/// `GET /health`: 서버 상태와 진행 중인 세션 수를 돌려줍니다.
///
/// `Result`를 사용하지 않으므로 이 핸들러는 실패하지 않습니다.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.service.sessions.len(),
    }))
}
