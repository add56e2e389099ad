//! # 오디오(내레이션) 생성
//!
//! 프레임의 `narration`을 음성으로 합성해 `{sessionId}/frame{n}.mp3`에 저장합니다.
//!
//! 음성 선택 우선순위: 요청의 `voiceId` → 세션의 `voiceId` → 서버 기본 음성 → 없음.
//! "없음"이면 합성 요청에서 voice 필드 자체가 빠집니다 (`SpeechRequest` 참고).
//! 요청 한도 초과를 따로 구분하지 않으므로 배치 전체가 멈추는 일은 없습니다 (`AssetPolicy::audio`).

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::assets::{attempt_with_retry, run_batch, AssetKind, AssetPolicy, AttemptOutcome, BatchReport};
use super::clients::{ObjectStorage, SpeechSynthesizer};
use super::session_store::SessionStore;
use crate::error::AppError;

/// 오디오 생성기
#[derive(Clone)]
pub struct AudioGenerator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    storage: Arc<dyn ObjectStorage>,
    default_voice: Option<String>,
    policy: AssetPolicy,
}

impl AudioGenerator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        storage: Arc<dyn ObjectStorage>,
        default_voice: Option<String>,
        policy: AssetPolicy,
    ) -> Self {
        Self {
            synthesizer,
            storage,
            default_voice,
            policy,
        }
    }

    /// 세션의 모든 프레임 내레이션을 순서대로 합성합니다.
    ///
    /// `voice_override`가 주어지면 이번 배치에서만 그 음성을 사용합니다.
    pub async fn generate(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        voice_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let mut narrations = Vec::new();
        let mut session_voice = None;
        let found = store.update(session_id, &mut |session| {
            session.ensure_frames();
            narrations = session.frames.iter().map(|f| f.narration.clone()).collect();
            session_voice = session.voice_id.clone();
        });
        if !found {
            return Err(AppError::NotFound);
        }

        let voice = self.resolve_voice(voice_override, session_voice.as_deref());
        let voice = voice.as_deref();
        let narrations = &narrations;
        let extension = self.synthesizer.extension();

        run_batch(
            store,
            session_id,
            narrations.len(),
            AssetKind::Audio,
            &self.policy,
            cancel,
            move |index| {
                let key = format!("{}/frame{}.{}", session_id, index + 1, extension);
                self.synthesize_to(key, &narrations[index], voice)
            },
        )
        .await
    }

    /// 한 프레임만 합성합니다 (재서술 경로). 재시도를 모두 소진하면 None.
    pub async fn generate_single(
        &self,
        key: String,
        narration: &str,
        voice: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let label = format!("audio generation ({})", key);
        match attempt_with_retry(&self.policy, cancel, &label, || {
            self.synthesize_to(key.clone(), narration, voice)
        })
        .await
        {
            AttemptOutcome::Succeeded(url) => Some(url),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        self.synthesizer.extension()
    }

    /// 요청 → 세션 → 기본값 순서로 비어 있지 않은 첫 음성
    pub fn resolve_voice(&self, requested: Option<&str>, session: Option<&str>) -> Option<String> {
        [requested, session, self.default_voice.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|voice| !voice.is_empty())
            .map(str::to_string)
    }

    async fn synthesize_to(
        &self,
        key: String,
        narration: &str,
        voice: Option<&str>,
    ) -> Result<String, super::clients::ServiceError> {
        let bytes = self.synthesizer.synthesize(narration, voice).await?;
        self.storage
            .put(&key, bytes, self.synthesizer.content_type())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clients::ServiceError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Silent;

    #[async_trait]
    impl SpeechSynthesizer for Silent {
        async fn synthesize(&self, _text: &str, _voice: Option<&str>) -> Result<Vec<u8>, ServiceError> {
            Err(ServiceError::NotConfigured("speech API key"))
        }
    }

    #[async_trait]
    impl ObjectStorage for Silent {
        async fn put(&self, key: &str, _bytes: Vec<u8>, _ct: &str) -> Result<String, ServiceError> {
            Ok(key.to_string())
        }
    }

    fn generator(default_voice: Option<&str>) -> AudioGenerator {
        AudioGenerator::new(
            Arc::new(Silent),
            Arc::new(Silent),
            default_voice.map(str::to_string),
            AssetPolicy::audio(1, Duration::ZERO),
        )
    }

    #[test]
    fn voice_resolution_skips_blank_values() {
        let audio = generator(Some("alloy"));
        assert_eq!(audio.resolve_voice(Some("nova"), Some("echo")).as_deref(), Some("nova"));
        assert_eq!(audio.resolve_voice(Some("  "), Some("echo")).as_deref(), Some("echo"));
        assert_eq!(audio.resolve_voice(None, None).as_deref(), Some("alloy"));
        assert_eq!(generator(None).resolve_voice(Some(""), None), None);
    }

    #[tokio::test]
    async fn single_frame_failure_yields_none() {
        let url = generator(None)
            .generate_single("s/frame1_1.mp3".into(), "hello", None, &CancellationToken::new())
            .await;
        assert_eq!(url, None);
    }
}
