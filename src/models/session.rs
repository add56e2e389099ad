//! # 생성 세션 모델 정의
//!
//! 진행 중인 스토리보드 생성 작업 하나의 작업 상태를 나타내는 구조체들입니다.
//!
//! ## 세션 흐름
//! 1. `CreateSessionRequest`로 세션 생성 → 콘텐츠 수집, 분석, 합성으로 `steps` 확정
//! 2. 이미지/오디오 생성 요청이 `frames[i]`의 URL 필드를 하나씩 채움
//! 3. 보존 기간(기본 24시간)이 지나면 백그라운드 정리 작업이 삭제
//!
//! `steps`는 합성 결과 원본이며 한 번 쓰이면 바뀌지 않습니다.
//! `frames`는 `steps`와 인덱스가 정렬된 작업본이고, 생성 단계는 URL 필드만 수정합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::analysis::AnalysisResult;

/// 내레이션 어조를 결정하는 스타일
///
/// JSON에서는 `"simplified"`, `"sports_analogy"`처럼 snake_case 문자열로 표현됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    /// 아이에게 설명하듯 쉬운 말로
    #[default]
    Simplified,
    /// 전문가용 정확한 용어로
    Professional,
    SportsAnalogy,
    CookingAnalogy,
    MovieAnalogy,
    NatureAnalogy,
}

impl Style {
    pub const ALL: [Style; 6] = [
        Style::Simplified,
        Style::Professional,
        Style::SportsAnalogy,
        Style::CookingAnalogy,
        Style::MovieAnalogy,
        Style::NatureAnalogy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Simplified => "simplified",
            Style::Professional => "professional",
            Style::SportsAnalogy => "sports_analogy",
            Style::CookingAnalogy => "cooking_analogy",
            Style::MovieAnalogy => "movie_analogy",
            Style::NatureAnalogy => "nature_analogy",
        }
    }

    /// 프롬프트에 넣을 어조 지시문
    pub fn tone(&self) -> &'static str {
        match self {
            Style::Simplified => {
                "Explain it the way you would to a curious ten-year-old: short words, everyday comparisons, no jargon."
            }
            Style::Professional => {
                "Use precise, professional language suitable for practitioners; keep terminology accurate and concise."
            }
            Style::SportsAnalogy => {
                "Explain every idea through a sports analogy (teams, plays, training, scoring)."
            }
            Style::CookingAnalogy => {
                "Explain every idea through a cooking analogy (recipes, ingredients, kitchen roles)."
            }
            Style::MovieAnalogy => {
                "Explain every idea through a movie-making analogy (scripts, directors, scenes, crews)."
            }
            Style::NatureAnalogy => {
                "Explain every idea through an analogy from nature (ecosystems, animals, seasons, rivers)."
            }
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Style::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Style::ALL.iter().map(Style::as_str).collect();
                format!("Unknown style '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// 합성 단계가 만든 스텝 하나: `step1`, `step2`, … 순서로 정렬됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// 스텝 키 (예: "step3")
    pub key: String,
    /// 이미지 모델용 순수 시각 묘사 (글자/라벨 없음)
    pub visual_scene: String,
    /// 2~4문장 분량의 설명 내레이션
    pub narration: String,
}

/// 작업용 프레임: 생성 단계가 `image_url`/`audio_url`을 채웁니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub visual_scene: String,
    pub narration: String,
    /// 이미지 생성이 이 프레임에서 성공하기 전까지는 None (JSON에서 필드 생략)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl From<&Step> for Frame {
    fn from(step: &Step) -> Self {
        Self {
            visual_scene: step.visual_scene.clone(),
            narration: step.narration.clone(),
            image_url: None,
            audio_url: None,
        }
    }
}

/// 진행 중인 생성 작업 하나의 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 세션 고유 식별자 (UUIDv7)
    pub id: String,
    /// 입력 URL: 저장 시 중복 제거 키로 사용됩니다
    pub source_url: String,
    pub style: Style,
    /// 선택한 음성: None이면 서비스 기본 음성
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    pub steps: Vec<Step>,
    pub frames: Vec<Frame>,
    pub analysis: AnalysisResult,
    /// 생성 시각: TTL 계산 기준
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// 합성 결과로 새 세션을 만듭니다. 프레임은 스텝마다 하나씩 바로 생성됩니다.
    pub fn new(
        source_url: String,
        style: Style,
        voice_id: Option<String>,
        steps: Vec<Step>,
        analysis: AnalysisResult,
    ) -> Self {
        let frames = steps.iter().map(Frame::from).collect();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            source_url,
            style,
            voice_id,
            steps,
            frames,
            analysis,
            created_at: Utc::now(),
        }
    }

    /// `frames`를 `steps`와 같은 길이로 맞춥니다.
    ///
    /// 이미 있는 프레임의 URL은 유지하고, 모자란 프레임은 스텝으로부터 만들고,
    /// 남는 프레임은 잘라냅니다. 생성 단계를 시작하기 전에 호출됩니다.
    pub fn ensure_frames(&mut self) {
        self.frames.truncate(self.steps.len());
        let existing = self.frames.len();
        let missing = self.steps[existing..].iter().map(Frame::from);
        self.frames.extend(missing);
    }

    /// 이 세션이 `now` 시점에 보존 기간을 넘겼는지 확인합니다.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// 세션 생성 요청: `POST /api/v1/sessions`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub source_url: Option<String>,
    /// 없으면 `simplified`
    pub style: Option<String>,
    pub voice_id: Option<String>,
}

/// 세션 생성 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub steps: Vec<Step>,
    pub analysis: AnalysisResult,
}

/// 오디오 생성 요청: 본문이 없거나 `voiceId`가 없으면 세션의 음성을 사용합니다.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAudioRequest {
    pub voice_id: Option<String>,
}

/// 프레임 재서술 요청: `newStyle`이 없으면 세션 스타일 유지
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RephraseRequest {
    #[serde(alias = "newStyle")]
    pub style: Option<String>,
}

/// 프레임 재서술 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RephraseResponse {
    pub new_narration: String,
    /// 오디오 재생성에 실패하면 null
    pub new_audio_url: Option<String>,
}
