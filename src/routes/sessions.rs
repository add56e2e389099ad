//! # 생성 세션 API 라우트 핸들러
//!
//! 스토리보드 생성 세션을 만들고, 이미지/오디오를 채우고, 프레임을 재서술하는 핸들러들입니다.
//! 이 경로들은 인증이 필요 없습니다. 세션 ID 자체가 추측하기 어려운 UUIDv7입니다.
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/sessions | `create_session` | 수집 → 분석 → 합성 |
//! | GET | /api/v1/sessions/{id} | `get_session` | 세션 전체 |
//! | DELETE | /api/v1/sessions/{id} | `delete_session` | 세션 삭제 |
//! | POST | /api/v1/sessions/{id}/images | `generate_images` | 프레임 이미지 생성 |
//! | POST | /api/v1/sessions/{id}/audio | `generate_audio` | 프레임 내레이션 음성 생성 |
//! | POST | /api/v1/sessions/{id}/frames/{index}/rephrase | `rephrase_frame` | 프레임 하나 재서술 |
//!
//! ## 사용 흐름
//! ```text
//! 1. POST /sessions {sourceUrl, style}        → sessionId, steps
//! 2. POST /sessions/{id}/images               → {generatedCount, totalCount, halted}
//! 3. POST /sessions/{id}/audio {voiceId?}     → {generatedCount, totalCount, halted}
//! 4. GET  /sessions/{id}                      → frames[i].imageUrl / audioUrl
//! ```
//! 2와 3은 순서에 상관없이, 몇 번이든 다시 호출할 수 있습니다 (프레임별 URL 덮어쓰기).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::AppState;
use crate::{error::AppError, models::*, services::BatchReport};

/// 새 세션을 만듭니다.
///
/// `POST /api/v1/sessions` + `{ "sourceUrl": "https://...", "style": "simplified", "voiceId": "alloy" }`
///
/// 응답은 201과 `{ "sessionId", "steps", "analysis" }`입니다.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let source_url = req
        .source_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::BadRequest("sourceUrl is required".to_string()))?;
    let style = parse_style(req.style.as_deref())?.unwrap_or_default();

    let cancel = state.shutdown.child_token();
    let session = state
        .service
        .create_session(source_url, style, req.voice_id, &cancel)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            steps: session.steps,
            analysis: session.analysis,
        }),
    ))
}

/// `GET /api/v1/sessions/{id}`: 세션 전체 문서
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.service.get_session(&id)?))
}

/// `DELETE /api/v1/sessions/{id}` → 204 No Content
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_session(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/sessions/{id}/images`
///
/// 프레임 일부가 실패해도 200입니다. 결과의 `generatedCount`로 성공 개수를 확인합니다.
pub async fn generate_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchReport>, AppError> {
    let cancel = state.shutdown.child_token();
    let report = state.service.generate_images(&id, &cancel).await?;
    Ok(Json(report))
}

/// `POST /api/v1/sessions/{id}/audio` + `{ "voiceId": "nova" }` (본문 생략 가능)
pub async fn generate_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<GenerateAudioRequest>>,
) -> Result<Json<BatchReport>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let cancel = state.shutdown.child_token();
    let report = state
        .service
        .generate_audio(&id, req.voice_id.as_deref(), &cancel)
        .await?;
    Ok(Json(report))
}

/// `POST /api/v1/sessions/{id}/frames/{index}/rephrase` + `{ "style": "movie_analogy" }` (본문 생략 가능)
///
/// `index`는 0부터 시작합니다.
pub async fn rephrase_frame(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    body: Option<Json<RephraseRequest>>,
) -> Result<Json<RephraseResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let style = parse_style(req.style.as_deref())?;
    let cancel = state.shutdown.child_token();
    let response = state.service.rephrase(&id, index, style, &cancel).await?;
    Ok(Json(response))
}

/// 빈 문자열은 "지정 안 함"으로, 알 수 없는 이름은 400으로 처리합니다.
fn parse_style(raw: Option<&str>) -> Result<Option<Style>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.parse().map(Some).map_err(AppError::BadRequest),
        None => Ok(None),
    }
}
