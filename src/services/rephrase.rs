//! # 프레임 재서술
//!
//! 프레임 하나의 내레이션만 다른 표현(선택적으로 다른 스타일)으로 다시 쓰고,
//! 그 프레임의 오디오만 다시 합성합니다. `visualScene`과 `imageUrl`, 다른 프레임은 건드리지 않습니다.
//!
//! 오디오 키에는 타임스탬프가 들어갑니다 (`{sessionId}/frame{n}_{unixMillis}.mp3`).
//! 같은 경로를 덮어쓰면 클라이언트/CDN 캐시가 예전 오디오를 내줄 수 있습니다.

use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::audio::AudioGenerator;
use super::clients::TextGenerator;
use super::json_extract::parse_json_object;
use super::session_store::SessionStore;
use crate::error::AppError;
use crate::models::{RephraseResponse, Style};

const REPHRASE_MAX_TOKENS: u32 = 400;

/// 프레임 재서술기
#[derive(Clone)]
pub struct FrameRephraser {
    generator: Arc<dyn TextGenerator>,
    audio: AudioGenerator,
}

impl FrameRephraser {
    pub fn new(generator: Arc<dyn TextGenerator>, audio: AudioGenerator) -> Self {
        Self { generator, audio }
    }

    /// # 에러
    /// - 세션 없음 → `NotFound`
    /// - 인덱스 범위 밖 → `BadRequest`
    /// - 생성 실패/빈 응답 → `Upstream` (세션은 그대로)
    pub async fn rephrase(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        frame_index: usize,
        new_style: Option<Style>,
        cancel: &CancellationToken,
    ) -> Result<RephraseResponse, AppError> {
        let session = store.get(session_id).ok_or(AppError::NotFound)?;
        let frame = session.frames.get(frame_index).ok_or_else(|| {
            AppError::BadRequest(format!(
                "frameIndex {} is out of range (session has {} frames)",
                frame_index,
                session.frames.len()
            ))
        })?;
        let style = new_style.unwrap_or(session.style);

        let prompt = rephrase_prompt(&frame.visual_scene, &frame.narration, style);
        let raw = self
            .generator
            .generate(&prompt, REPHRASE_MAX_TOKENS)
            .await
            .map_err(|err| AppError::Upstream(format!("rephrase failed: {}", err)))?;
        let narration = clean_narration(&raw)
            .ok_or_else(|| AppError::Upstream("rephrase returned an empty narration".to_string()))?;

        // 내레이션을 먼저 기록합니다. 이 시점부터 예전 오디오는 내용이 맞지 않으므로 비웁니다.
        let found = store.update(session_id, &mut |session| {
            if let Some(frame) = session.frames.get_mut(frame_index) {
                frame.narration = narration.clone();
                frame.audio_url = None;
            }
        });
        if !found {
            return Err(AppError::NotFound);
        }

        let key = format!(
            "{}/frame{}_{}.{}",
            session_id,
            frame_index + 1,
            chrono::Utc::now().timestamp_millis(),
            self.audio.extension()
        );
        let voice = self.audio.resolve_voice(None, session.voice_id.as_deref());
        let audio_url = self
            .audio
            .generate_single(key, &narration, voice.as_deref(), cancel)
            .await;

        match &audio_url {
            Some(url) => {
                let mut url = Some(url.clone());
                store.update(session_id, &mut |session| {
                    if let Some(frame) = session.frames.get_mut(frame_index) {
                        frame.audio_url = url.take();
                    }
                });
            }
            None => warn!(
                "rephrased narration has no audio (session_id={}, frame={})",
                session_id,
                frame_index + 1
            ),
        }

        info!(
            "frame rephrased (session_id={}, frame={}, style={})",
            session_id,
            frame_index + 1,
            style
        );
        Ok(RephraseResponse {
            new_narration: narration,
            new_audio_url: audio_url,
        })
    }
}

#[derive(Deserialize)]
struct NarrationReply {
    narration: String,
}

/// 모델 응답을 내레이션 한 덩어리로 정리합니다. 비어 있으면 None.
///
/// `{"narration": "..."}` 형태와 따옴표로 감싼 평문 모두 받습니다.
pub fn clean_narration(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let text = if trimmed.contains('{') {
        match parse_json_object::<NarrationReply>(trimmed) {
            Ok(reply) => reply.narration,
            Err(_) => trimmed.to_string(),
        }
    } else {
        trimmed.to_string()
    };

    let text = text
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”'))
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn rephrase_prompt(visual_scene: &str, narration: &str, style: Style) -> String {
    format!(
        "A storyboard frame shows this scene (keep it exactly as is):\n{visual_scene}\n\n\
         Its current narration is:\n{narration}\n\n\
         Write an alternative narration of 2 to 4 sentences that explains the same idea. {tone}\n\
         Reply with the new narration only, no quotes and no preamble.",
        tone = style.tone()
    )
}
