//! # 스토리보드 저장소 쿼리 모듈
//!
//! 저장된 스토리보드를 source URL 기준으로 중복 없이 관리합니다.
//! 모든 함수는 `SqlitePool` 참조를 받아 비동기로 실행됩니다.
//!
//! ## 테이블 구조
//! - `storyboards`: source_url 하나당 정확히 한 행 (PRIMARY KEY)
//! - `storyboard_owners`: (source_url, subject_id): 소유자 집합
//!
//! ## 저장/삭제 규칙
//! ```text
//! save(u1, url)  → 없으면 생성 (Created)          owners = {u1}
//! save(u2, url)  → 소유자만 추가 (OwnerAdded)      owners = {u1, u2}, 내용은 그대로
//! save(u2, url)  → 변화 없음 (AlreadyOwned)
//! delete(url,u1) → 소유자 제거 (OwnerRemoved)      owners = {u2}
//! delete(url,u2) → 마지막 소유자 → 행 삭제 (RecordDeleted)
//! ```
//!
//! 모든 함수는 URL을 `canonical_source_url`로 정규화한 뒤 키로 씁니다.
//! `https://x/a`, `https://X/a/`, `https://x/a#top`은 같은 스토리보드입니다.
//!
//! "처음 저장한 사람의 내용이 유지"되는 규칙은 의도된 단순화입니다.
//! 두 사용자가 동시에 처음 저장해도 `ON CONFLICT DO NOTHING`이 둘 중 하나만 생성하게 합니다.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::AppError;
use crate::models::{
    AnalysisResult, DeleteOutcome, SaveOutcome, SavedFrame, SavedStoryboard, Session,
    StoryboardRow,
};

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

const SELECT_COLUMNS: &str = "s.source_url, s.creator_id, s.title, s.slug, s.style, s.voice_id, \
     s.steps_json, s.frames_json, s.created_at, s.updated_at";

/// 세션을 `subject_id`의 라이브러리에 저장합니다.
///
/// ## 처리 흐름 (하나의 트랜잭션)
/// 1. `INSERT ... ON CONFLICT(source_url) DO NOTHING`: 영향 받은 행이 1이면 새로 만든 것
/// 2. `INSERT OR IGNORE` 소유자 행: 영향 받은 행이 0이면 이미 소유자
/// 3. 기존 레코드에 소유자가 새로 붙었으면 `updated_at` 갱신
pub async fn save_storyboard(
    pool: &SqlitePool,
    subject_id: &str,
    session: &Session,
    title: Option<&str>,
) -> Result<(SaveOutcome, SavedStoryboard), AppError> {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_title(session));
    let slug = slug::slugify(&title);
    // 생성된 미디어 URL은 저장하지 않습니다: 텍스트만
    let frames: Vec<SavedFrame> = session.frames.iter().map(SavedFrame::from).collect();
    let steps_json = serde_json::to_string(&session.steps)?;
    let frames_json = serde_json::to_string(&frames)?;
    let source_url = canonical_source_url(&session.source_url);

    let mut tx = pool.begin().await?;

    let created = sqlx::query(
        r#"
        INSERT INTO storyboards
            (source_url, creator_id, title, slug, style, voice_id, steps_json, frames_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_url) DO NOTHING
        "#,
    )
    .bind(&source_url)
    .bind(subject_id)
    .bind(&title)
    .bind(&slug)
    .bind(session.style.as_str())
    .bind(session.voice_id.as_deref())
    .bind(&steps_json)
    .bind(&frames_json)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    let owner_added = sqlx::query(
        "INSERT OR IGNORE INTO storyboard_owners (source_url, subject_id) VALUES (?, ?)",
    )
    .bind(&source_url)
    .bind(subject_id)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    let outcome = match (created, owner_added) {
        (true, _) => SaveOutcome::Created,
        (false, true) => {
            sqlx::query(
                "UPDATE storyboards SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE source_url = ?",
            )
            .bind(&source_url)
            .execute(&mut *tx)
            .await?;
            SaveOutcome::OwnerAdded
        }
        (false, false) => SaveOutcome::AlreadyOwned,
    };

    let storyboard = fetch_in(&mut tx, &source_url)
        .await?
        .ok_or_else(|| AppError::Internal("Failed to retrieve saved storyboard".to_string()))?;
    tx.commit().await?;

    tracing::info!(
        "storyboard saved (source_url={}, subject_id={}, outcome={:?}, owners={})",
        source_url,
        subject_id,
        outcome,
        storyboard.owner_set.len()
    );
    Ok((outcome, storyboard))
}

/// source URL로 스토리보드 하나를 조회합니다.
pub async fn get_storyboard(
    pool: &SqlitePool,
    source_url: &str,
) -> Result<Option<SavedStoryboard>, AppError> {
    let source_url = canonical_source_url(source_url);
    let mut tx = pool.begin().await?;
    let storyboard = fetch_in(&mut tx, &source_url).await?;
    tx.commit().await?;
    Ok(storyboard)
}

/// `subject_id`를 소유자 집합에서 뺍니다. 마지막 소유자였다면 레코드를 삭제합니다.
pub async fn delete_storyboard(
    pool: &SqlitePool,
    source_url: &str,
    subject_id: &str,
) -> Result<DeleteOutcome, AppError> {
    let source_url = canonical_source_url(source_url);
    let source_url = source_url.as_str();
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        "DELETE FROM storyboard_owners WHERE source_url = ? AND subject_id = ?",
    )
    .bind(source_url)
    .bind(subject_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let outcome = if removed == 0 {
        DeleteOutcome::NotOwned
    } else {
        let (remaining,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM storyboard_owners WHERE source_url = ?")
                .bind(source_url)
                .fetch_one(&mut *tx)
                .await?;

        if remaining == 0 {
            sqlx::query("DELETE FROM storyboards WHERE source_url = ?")
                .bind(source_url)
                .execute(&mut *tx)
                .await?;
            DeleteOutcome::RecordDeleted
        } else {
            DeleteOutcome::OwnerRemoved
        }
    };

    tx.commit().await?;
    tracing::info!(
        "storyboard unsaved (source_url={}, subject_id={}, outcome={:?})",
        source_url,
        subject_id,
        outcome
    );
    Ok(outcome)
}

/// `subject_id`가 소유한 스토리보드를 최근 수정 순으로 조회합니다.
///
/// `limit`은 1..=100으로 맞추고, 없으면 20입니다.
pub async fn list_storyboards_for(
    pool: &SqlitePool,
    subject_id: &str,
    limit: Option<i64>,
) -> Result<Vec<SavedStoryboard>, AppError> {
    let limit = clamp_limit(limit);
    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, StoryboardRow>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM storyboards s
        JOIN storyboard_owners o ON o.source_url = s.source_url
        WHERE o.subject_id = ?
        ORDER BY s.updated_at DESC, s.source_url
        LIMIT ?
        "#
    ))
    .bind(subject_id)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    let mut storyboards = Vec::with_capacity(rows.len());
    for row in rows {
        let owners = owners_of(&mut tx, &row.source_url).await?;
        storyboards.push(row.into_storyboard(owners)?);
    }
    tx.commit().await?;

    Ok(storyboards)
}

/// 중복 판단에 쓰는 정규화된 source URL
///
/// 프래그먼트를 버리고 경로 끝의 `/`를 뗍니다. 스킴/호스트 대소문자와 기본 포트는 URL 파서가 정리합니다.
/// 파싱할 수 없는 값은 앞뒤 공백만 제거합니다.
pub fn canonical_source_url(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(mut parsed) = reqwest::Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    parsed.set_fragment(None);
    if parsed.path().len() > 1 && parsed.path().ends_with('/') {
        let path = parsed.path().trim_end_matches('/').to_string();
        parsed.set_path(if path.is_empty() { "/" } else { &path });
    }
    parsed.to_string()
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// 제목이 없을 때: 분석의 첫 주제, 없으면 URL의 호스트 + 경로
///
/// 분석이 폴백 값이면 주제가 의미 없으므로 URL을 씁니다.
pub fn default_title(session: &Session) -> String {
    let analysis_is_fallback = session.analysis.topics == AnalysisResult::fallback().topics;
    if let Some(topic) = session
        .analysis
        .topics
        .first()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && !analysis_is_fallback)
    {
        return topic.to_string();
    }

    match reqwest::Url::parse(&session.source_url) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            let path = url.path().trim_end_matches('/');
            format!("{}{}", host, path)
        }
        Err(_) => session.source_url.clone(),
    }
}

async fn fetch_in(
    tx: &mut Transaction<'_, Sqlite>,
    source_url: &str,
) -> Result<Option<SavedStoryboard>, AppError> {
    let row = sqlx::query_as::<_, StoryboardRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM storyboards s WHERE s.source_url = ?"
    ))
    .bind(source_url)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => {
            let owners = owners_of(tx, source_url).await?;
            Ok(Some(row.into_storyboard(owners)?))
        }
        None => Ok(None),
    }
}

async fn owners_of(
    tx: &mut Transaction<'_, Sqlite>,
    source_url: &str,
) -> Result<Vec<String>, AppError> {
    let owners: Vec<(String,)> = sqlx::query_as(
        "SELECT subject_id FROM storyboard_owners WHERE source_url = ? ORDER BY subject_id",
    )
    .bind(source_url)
    .fetch_all(&mut **tx)
    .await?;

    Ok(owners.into_iter().map(|(subject,)| subject).collect())
}
