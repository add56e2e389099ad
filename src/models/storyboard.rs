//! # 저장된 스토리보드 모델
//!
//! 세션이 "저장"되면 source URL을 키로 중복 제거된 영구 레코드가 됩니다.
//! 같은 URL을 여러 사용자가 저장하면 레코드는 하나이고, 소유자 집합만 늘어납니다.
//!
//! 프레임은 텍스트(`visualScene` + `narration`)만 저장합니다.
//! 생성된 이미지/오디오 URL은 만료되거나 깨질 수 있으므로 의도적으로 제외합니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::session::{Frame, Step};

/// 텍스트만 남긴 프레임
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFrame {
    pub visual_scene: String,
    pub narration: String,
}

impl From<&Frame> for SavedFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            visual_scene: frame.visual_scene.clone(),
            narration: frame.narration.clone(),
        }
    }
}

/// 영구 저장된 스토리보드 — `source_url`당 정확히 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStoryboard {
    pub source_url: String,
    /// 이 URL을 처음 저장한 사용자
    pub creator_id: String,
    /// 이 스토리보드를 라이브러리에 가진 사용자들: 레코드가 있는 동안 절대 비지 않음
    pub owner_set: BTreeSet<String>,
    pub title: String,
    pub slug: String,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    pub steps: Vec<Step>,
    pub frames: Vec<SavedFrame>,
    pub created_at: String,
    pub updated_at: String,
}

/// `storyboards` 테이블 한 행: 스텝/프레임은 JSON 텍스트 컬럼입니다.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoryboardRow {
    pub source_url: String,
    pub creator_id: String,
    pub title: String,
    pub slug: String,
    pub style: String,
    pub voice_id: Option<String>,
    pub steps_json: String,
    pub frames_json: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoryboardRow {
    /// 소유자 목록과 합쳐 API용 구조체로 변환합니다.
    pub fn into_storyboard(
        self,
        owners: impl IntoIterator<Item = String>,
    ) -> Result<SavedStoryboard, serde_json::Error> {
        Ok(SavedStoryboard {
            steps: serde_json::from_str(&self.steps_json)?,
            frames: serde_json::from_str(&self.frames_json)?,
            owner_set: owners.into_iter().collect(),
            source_url: self.source_url,
            creator_id: self.creator_id,
            title: self.title,
            slug: self.slug,
            style: self.style,
            voice_id: self.voice_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 저장 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// 이 URL의 첫 저장: 새 레코드 생성
    Created,
    /// 기존 레코드에 소유자 추가
    OwnerAdded,
    /// 이미 소유자: 아무것도 바뀌지 않음
    AlreadyOwned,
}

/// 저장 취소 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// 레코드가 없거나 이 사용자가 소유자가 아님
    NotOwned,
    /// 소유자 집합에서만 제거됨
    OwnerRemoved,
    /// 마지막 소유자였으므로 레코드 자체가 삭제됨
    RecordDeleted,
}

/// 저장 요청: `POST /api/v1/storyboards`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStoryboardRequest {
    pub session_id: String,
    pub title: Option<String>,
}

/// 저장 응답
#[derive(Debug, Serialize)]
pub struct SaveStoryboardResponse {
    pub outcome: SaveOutcome,
    pub storyboard: SavedStoryboard,
}

/// `GET /storyboards?limit=20`
#[derive(Debug, Default, Deserialize)]
pub struct ListStoryboardsQuery {
    pub limit: Option<i64>,
}

/// `?url=https://...`: 스토리보드는 source URL로 식별됩니다.
#[derive(Debug, Deserialize)]
pub struct SourceUrlQuery {
    pub url: String,
}
