//! # 이미지 생성
//!
//! 프레임마다 프롬프트를 세 겹으로 쌓습니다.
//! 1. 고정 스타일 접두어: 일관된 그림체 + "글자/라벨 금지"
//! 2. 위치 맥락: "frame K of N", K>1이면 "continuing the story"
//! 3. 프레임의 `visualScene`
//!
//! 선택적으로 텍스트 생성 서비스로 프롬프트를 보강합니다. 보강이 실패하면 원래 프롬프트를 씁니다.
//! 보강은 배치 루프 안에서 프레임마다 하므로 취소와 중단 정책을 그대로 따릅니다.
//! 요청 한도 초과 신호는 남은 프레임 전체를 멈춥니다 (`AssetPolicy::image`).

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::assets::{run_batch, AssetKind, AssetPolicy, BatchReport};
use super::clients::{ImageSynthesizer, ObjectStorage, ServiceError, TextGenerator};
use super::session_store::SessionStore;
use crate::error::AppError;

pub const STYLE_PREFIX: &str = "Clean, friendly digital illustration with soft lighting, consistent characters \
and a cohesive color palette across the whole series. Absolutely no text, letters, words, numbers, labels, \
captions, speech bubbles or signage anywhere in the image.";

const ENHANCE_MAX_TOKENS: u32 = 300;

/// 보강 요청 앞머리. 원래 프롬프트는 빈 줄 다음에 붙습니다.
pub const ENHANCE_INSTRUCTION: &str = "Rewrite this image prompt with richer visual detail \
(composition, lighting, colors). Keep every constraint it states, especially the ban on any text \
or labels. Reply with the prompt only.";

/// 이미지 생성기
#[derive(Clone)]
pub struct ImageGenerator {
    synthesizer: Arc<dyn ImageSynthesizer>,
    storage: Arc<dyn ObjectStorage>,
    /// 프롬프트 보강용: None이면 보강하지 않음
    enhancer: Option<Arc<dyn TextGenerator>>,
    policy: AssetPolicy,
}

impl ImageGenerator {
    pub fn new(
        synthesizer: Arc<dyn ImageSynthesizer>,
        storage: Arc<dyn ObjectStorage>,
        enhancer: Option<Arc<dyn TextGenerator>>,
        policy: AssetPolicy,
    ) -> Self {
        Self {
            synthesizer,
            storage,
            enhancer,
            policy,
        }
    }

    /// 세션의 모든 프레임 이미지를 순서대로 생성합니다.
    pub async fn generate(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let mut scenes = Vec::new();
        let found = store.update(session_id, &mut |session| {
            session.ensure_frames();
            scenes = session.frames.iter().map(|f| f.visual_scene.clone()).collect();
        });
        if !found {
            return Err(AppError::NotFound);
        }

        let total = scenes.len();
        // 보강은 프레임 차례가 왔을 때 한 번만 하고, 재시도는 같은 프롬프트로 합니다.
        // 취소나 요청 한도 초과로 멈춘 뒤의 프레임은 보강도 하지 않습니다.
        let prompts: Mutex<Vec<Option<String>>> = Mutex::new(vec![None; total]);
        let extension = self.synthesizer.extension();
        let content_type = self.synthesizer.content_type();
        let (scenes, prompts) = (&scenes, &prompts);

        run_batch(
            store,
            session_id,
            total,
            AssetKind::Image,
            &self.policy,
            cancel,
            move |index| {
                let key = format!("{}/frame{}.{}", session_id, index + 1, extension);
                async move {
                    let cached = prompts.lock()[index].clone();
                    let prompt = match cached {
                        Some(prompt) => prompt,
                        None => {
                            let base = frame_prompt(&scenes[index], index + 1, total);
                            let prompt = self.enhance(base, cancel).await?;
                            prompts.lock()[index] = Some(prompt.clone());
                            prompt
                        }
                    };
                    let bytes = self.synthesizer.synthesize(&prompt).await?;
                    self.storage.put(&key, bytes, content_type).await
                }
            },
        )
        .await
    }

    /// 보강 서비스로 프롬프트에 시각적 디테일을 더합니다. 실패하면 원래 프롬프트.
    ///
    /// # 에러
    /// 보강 도중 취소되면 `ServiceError::Cancelled`
    async fn enhance(
        &self,
        prompt: String,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        let Some(enhancer) = &self.enhancer else {
            return Ok(prompt);
        };
        let request = format!("{}\n\n{}", ENHANCE_INSTRUCTION, prompt);
        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            reply = enhancer.generate(&request, ENHANCE_MAX_TOKENS) => reply,
        };
        Ok(match reply {
            Ok(enhanced) if !enhanced.trim().is_empty() => {
                debug!("image prompt enhanced");
                enhanced.trim().to_string()
            }
            Ok(_) => prompt,
            Err(err) => {
                warn!("image prompt enhancement failed, using original prompt: {}", err);
                prompt
            }
        })
    }
}

/// 프레임 K/N의 기본 이미지 프롬프트
pub fn frame_prompt(visual_scene: &str, position: usize, total: usize) -> String {
    let continuity = if position > 1 {
        ", continuing the story from the previous frame"
    } else {
        ""
    };
    format!(
        "{} This is frame {} of {}{}. Scene: {}",
        STYLE_PREFIX,
        position,
        total,
        continuity,
        visual_scene.trim()
    )
}
