//! # 스토리보드 생성 파이프라인
//!
//! 수집 → 분석 → 합성으로 세션을 만들고, 이미지/오디오/재서술 단계를 세션 단위로 실행하는 파사드입니다.
//! 라우트 핸들러는 이 타입 하나만 알면 됩니다.
//!
//! ```text
//! create_session:  ContentAcquirer ─▶ ContentAnalyzer ─▶ StoryboardSynthesizer ─▶ SessionStore
//!                        │ (저장소 URL이면)
//!                        └─▶ structure::analyze ─▶ analysis.structure
//! generate_images / generate_audio / rephrase:  SessionStore ⇄ 각 생성기
//! ```
//!
//! 모든 단계는 순차적으로 실행됩니다. 세션 사이의 동시성은 `SessionStore`의 락이 보호합니다.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::acquisition::{ContentAcquirer, SourceKind};
use super::analyzer::ContentAnalyzer;
use super::assets::BatchReport;
use super::audio::AudioGenerator;
use super::images::ImageGenerator;
use super::rephrase::FrameRephraser;
use super::session_store::SessionStore;
use super::structure;
use super::synthesizer::StoryboardSynthesizer;
use crate::error::AppError;
use crate::models::{RephraseResponse, Session, Style};

/// 파이프라인 구성 요소 묶음
#[derive(Clone)]
pub struct StoryboardService {
    pub sessions: Arc<dyn SessionStore>,
    acquirer: ContentAcquirer,
    analyzer: ContentAnalyzer,
    synthesizer: StoryboardSynthesizer,
    images: ImageGenerator,
    audio: AudioGenerator,
    rephraser: FrameRephraser,
}

impl StoryboardService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        acquirer: ContentAcquirer,
        analyzer: ContentAnalyzer,
        synthesizer: StoryboardSynthesizer,
        images: ImageGenerator,
        audio: AudioGenerator,
        rephraser: FrameRephraser,
    ) -> Self {
        Self {
            sessions,
            acquirer,
            analyzer,
            synthesizer,
            images,
            audio,
            rephraser,
        }
    }

    /// 입력 URL로 새 세션을 만듭니다. 프레임 뼈대까지 확정된 세션을 돌려줍니다.
    ///
    /// # 에러
    /// - URL 누락/형식 오류 → `BadRequest`
    /// - 본문 부족 → `InsufficientContent`
    /// - 합성 실패 → `Upstream`
    pub async fn create_session(
        &self,
        source_url: &str,
        style: Style,
        voice_id: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Session, AppError> {
        let content = cancellable(cancel, self.acquirer.fetch(source_url)).await??;

        let mut analysis = cancellable(cancel, self.analyzer.analyze(&content.text)).await?;
        if content.kind == SourceKind::Repository {
            analysis.structure = Some(structure::analyze(&content.text));
        }

        let steps = cancellable(
            cancel,
            self.synthesizer.synthesize(&content.text, &analysis, style),
        )
        .await??;

        let voice_id = voice_id.filter(|v| !v.trim().is_empty());
        let session = Session::new(source_url.trim().to_string(), style, voice_id, steps, analysis);
        self.sessions.create(session.clone());
        info!(
            "session ready (session_id={}, source_url={}, frames={})",
            session.id,
            session.source_url,
            session.frames.len()
        );
        Ok(session)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Session, AppError> {
        self.sessions.get(session_id).ok_or(AppError::NotFound)
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        if self.sessions.delete(session_id) {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn generate_images(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        self.images
            .generate(self.sessions.as_ref(), session_id, cancel)
            .await
    }

    pub async fn generate_audio(
        &self,
        session_id: &str,
        voice_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        self.audio
            .generate(self.sessions.as_ref(), session_id, voice_override, cancel)
            .await
    }

    pub async fn rephrase(
        &self,
        session_id: &str,
        frame_index: usize,
        new_style: Option<Style>,
        cancel: &CancellationToken,
    ) -> Result<RephraseResponse, AppError> {
        self.rephraser
            .rephrase(self.sessions.as_ref(), session_id, frame_index, new_style, cancel)
            .await
    }
}

/// 취소 토큰과 경쟁시킵니다. 취소되면 진행 중인 호출은 버려지고 `Cancelled` 에러가 됩니다.
async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl std::future::Future<Output = T>,
) -> Result<T, AppError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        output = work => Ok(output),
    }
}
