//! # 저장된 스토리보드 API 라우트 핸들러
//!
//! 모든 핸들러는 `AuthUser` 추출기로 Bearer 토큰을 검증한 뒤 실행됩니다.
//! 스토리보드는 source URL로 식별되므로 경로 대신 `?url=` 쿼리를 씁니다.
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/storyboards | `save_storyboard` | 세션을 내 라이브러리에 저장 |
//! | GET | /api/v1/storyboards?limit=20 | `list_storyboards` | 내 스토리보드 목록 |
//! | GET | /api/v1/storyboards/lookup?url=... | `lookup_storyboard` | URL로 조회 |
//! | DELETE | /api/v1/storyboards?url=... | `delete_storyboard` | 내 라이브러리에서 제거 |

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::{db, error::AppError, middleware::AuthUser, models::*};

/// 세션을 저장합니다.
///
/// `POST /api/v1/storyboards` + `{ "sessionId": "...", "title": "선택" }`
///
/// 새로 만들어졌으면 201, 이미 있던 레코드에 합류했거나 이미 소유 중이면 200입니다.
pub async fn save_storyboard(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(req): Json<SaveStoryboardRequest>,
) -> Result<(StatusCode, Json<SaveStoryboardResponse>), AppError> {
    let session = state.service.get_session(&req.session_id)?;

    let (outcome, storyboard) = db::save_storyboard(
        &state.pool,
        &identity.subject_id,
        &session,
        req.title.as_deref(),
    )
    .await?;

    let status = match outcome {
        SaveOutcome::Created => StatusCode::CREATED,
        SaveOutcome::OwnerAdded | SaveOutcome::AlreadyOwned => StatusCode::OK,
    };
    Ok((status, Json(SaveStoryboardResponse { outcome, storyboard })))
}

/// `GET /api/v1/storyboards?limit=20` → `{ "storyboards": [...] }` (최근 수정 순)
pub async fn list_storyboards(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<ListStoryboardsQuery>,
) -> Result<Json<Value>, AppError> {
    let storyboards =
        db::list_storyboards_for(&state.pool, &identity.subject_id, query.limit).await?;
    Ok(Json(json!({ "storyboards": storyboards })))
}

/// `GET /api/v1/storyboards/lookup?url=...`
///
/// 소유 여부와 상관없이 조회할 수 있습니다. 다른 사람이 이미 만든 스토리보드를
/// 발견하고 저장(합류)하는 흐름에 씁니다.
pub async fn lookup_storyboard(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Query(query): Query<SourceUrlQuery>,
) -> Result<Json<SavedStoryboard>, AppError> {
    let storyboard = db::get_storyboard(&state.pool, query.url.trim())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(storyboard))
}

/// `DELETE /api/v1/storyboards?url=...`
///
/// 소유자가 아니면 404이고 아무것도 바뀌지 않습니다.
pub async fn delete_storyboard(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<SourceUrlQuery>,
) -> Result<StatusCode, AppError> {
    match db::delete_storyboard(&state.pool, query.url.trim(), &identity.subject_id).await? {
        DeleteOutcome::NotOwned => Err(AppError::NotFound),
        DeleteOutcome::OwnerRemoved | DeleteOutcome::RecordDeleted => Ok(StatusCode::NO_CONTENT),
    }
}
