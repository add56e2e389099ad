//! 통합 테스트용 가짜 외부 서비스와 조립 헬퍼
//!
//! 모든 가짜는 `services::clients` 트레이트를 구현하고, 받은 호출을 기록합니다.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use storyreel::services::{
    acquisition::ContentAcquirer,
    analyzer::ContentAnalyzer,
    audio::AudioGenerator,
    clients::{
        FetchedPage, ImageSynthesizer, ObjectStorage, PageKind, PageSource, ReadmeSource,
        ServiceError, SpeechSynthesizer, TextGenerator,
    },
    images::ImageGenerator,
    rephrase::FrameRephraser,
    synthesizer::StoryboardSynthesizer,
    AssetPolicy, InMemorySessionStore, SessionStore, StoryboardService,
};

// ── 텍스트 생성 ──

/// 프롬프트 종류(분석/합성/재서술)에 따라 정해진 응답을 돌려주는 생성기
pub struct ScriptedText {
    pub analysis: Mutex<Result<String, u16>>,
    pub storyboard: Mutex<Result<String, u16>>,
    pub rephrase: Mutex<Result<String, u16>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new(analysis: &str, storyboard: &str) -> Self {
        Self {
            analysis: Mutex::new(Ok(analysis.to_string())),
            storyboard: Mutex::new(Ok(storyboard.to_string())),
            rephrase: Mutex::new(Ok("A fresh way to say it.".to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_rephrase(&self, reply: Result<&str, u16>) {
        *self.rephrase.lock() = reply.map(str::to_string);
    }

    pub fn set_analysis(&self, reply: Result<&str, u16>) {
        *self.analysis.lock() = reply.map(str::to_string);
    }

    pub fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ServiceError> {
        self.prompts.lock().push(prompt.to_string());
        let reply = if prompt.starts_with("Analyze the following content") {
            self.analysis.lock().clone()
        } else if prompt.starts_with("Turn the content below into a storyboard") {
            self.storyboard.lock().clone()
        } else {
            self.rephrase.lock().clone()
        };
        reply.map_err(|status| ServiceError::Status {
            status,
            body: "scripted failure".to_string(),
        })
    }
}

/// `step1`..`stepN` 스토리보드 JSON
pub fn storyboard_json(frames: usize) -> String {
    let entries: Vec<String> = (1..=frames)
        .map(|i| {
            format!(
                r#""step{i}": {{"visualScene": "scene {i}", "narration": "narration {i}"}}"#
            )
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

pub fn analysis_json(frames: u32) -> String {
    format!(
        r#"{{"topics": ["x", "y"], "concepts": ["c"], "summary": "s", "complexity": "low", "recommendedFrameCount": {frames}}}"#
    )
}

/// 이미지 프롬프트 보강기. 원래 프롬프트(요청의 마지막 문단) 앞에 접두어를 붙입니다.
pub struct FakeEnhancer {
    pub reply: Result<&'static str, u16>,
    pub requests: Mutex<Vec<String>>,
    /// 호출되면 이 토큰을 취소하고 응답하지 않습니다.
    pub cancel_on_call: Option<CancellationToken>,
}

impl FakeEnhancer {
    pub fn prefixing(prefix: &'static str) -> Self {
        Self {
            reply: Ok(prefix),
            requests: Mutex::new(Vec::new()),
            cancel_on_call: None,
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::prefixing("")
        }
    }

    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some(token),
            ..Self::prefixing("")
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl TextGenerator for FakeEnhancer {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ServiceError> {
        self.requests.lock().push(prompt.to_string());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
            std::future::pending::<()>().await;
        }
        let original = prompt.rsplit("\n\n").next().unwrap_or(prompt);
        match self.reply {
            Ok(prefix) => Ok(format!("{} {}", prefix, original)),
            Err(status) => Err(ServiceError::Status {
                status,
                body: "enhancer down".to_string(),
            }),
        }
    }
}

// ── 이미지 / 음성 ──

/// 프레임별 실패 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// HTTP 500
    ServerError,
    /// HTTP 429
    RateLimited,
}

impl Failure {
    fn error(self) -> ServiceError {
        match self {
            Failure::ServerError => ServiceError::Status {
                status: 500,
                body: "boom".to_string(),
            },
            Failure::RateLimited => ServiceError::RateLimited,
        }
    }
}

/// 프롬프트의 "frame K of N"으로 프레임 번호(1부터)를 찾아 실패를 주입하는 이미지 서비스
#[derive(Default)]
pub struct FakeImages {
    pub failures: HashMap<usize, Failure>,
    pub calls: Mutex<Vec<usize>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeImages {
    pub fn failing(failures: impl IntoIterator<Item = (usize, Failure)>) -> Self {
        Self {
            failures: failures.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls_for(&self, frame: usize) -> usize {
        self.calls.lock().iter().filter(|&&f| f == frame).count()
    }
}

fn frame_number(prompt: &str) -> usize {
    prompt
        .split("This is frame ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl ImageSynthesizer for FakeImages {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, ServiceError> {
        let frame = frame_number(prompt);
        self.calls.lock().push(frame);
        self.prompts.lock().push(prompt.to_string());
        match self.failures.get(&frame) {
            Some(failure) => Err(failure.error()),
            None => Ok(format!("png-{}", frame).into_bytes()),
        }
    }
}

/// 내레이션 텍스트 기준으로 실패를 주입하는 음성 서비스
#[derive(Default)]
pub struct FakeSpeech {
    pub failures: HashMap<String, Failure>,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeSpeech {
    pub fn failing(failures: impl IntoIterator<Item = (&'static str, Failure)>) -> Self {
        Self {
            failures: failures
                .into_iter()
                .map(|(text, failure)| (text.to_string(), failure))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn voices(&self) -> Vec<Option<String>> {
        self.calls.lock().iter().map(|(_, v)| v.clone()).collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, ServiceError> {
        self.calls
            .lock()
            .push((text.to_string(), voice.map(str::to_string)));
        match self.failures.get(text) {
            Some(failure) => Err(failure.error()),
            None => Ok(text.as_bytes().to_vec()),
        }
    }
}

// ── 저장소 ──

/// 키 → 바이트를 메모리에 보관하고 `mem://{key}`를 돌려줍니다.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn keys(&self) -> HashSet<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ServiceError> {
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(format!("mem://{}", key))
    }
}

// ── 콘텐츠 수집 ──

/// 고정된 본문(또는 실패)을 돌려주는 수집 단계. 호출 순서를 공유 로그에 남깁니다.
pub struct FakePage {
    pub name: &'static str,
    pub body: Option<(String, PageKind)>,
    pub log: Arc<Mutex<Vec<&'static str>>>,
}

impl FakePage {
    pub fn ok(
        name: &'static str,
        body: &str,
        kind: PageKind,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn PageSource> {
        Arc::new(Self {
            name,
            body: Some((body.to_string(), kind)),
            log: log.clone(),
        })
    }

    pub fn failing(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn PageSource> {
        Arc::new(Self {
            name,
            body: None,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl PageSource for FakePage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _url: &str) -> Result<FetchedPage, ServiceError> {
        self.log.lock().push(self.name);
        match &self.body {
            Some((body, kind)) => Ok(FetchedPage {
                body: body.clone(),
                kind: *kind,
            }),
            None => Err(ServiceError::Timeout),
        }
    }
}

/// 브랜치별 README
#[derive(Default)]
pub struct FakeReadme {
    pub by_branch: HashMap<&'static str, String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ReadmeSource for FakeReadme {
    async fn fetch_readme(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_branch.get(branch).cloned().ok_or(ServiceError::Status {
            status: 404,
            body: "not found".to_string(),
        })
    }
}

/// 8,500자 분량의 기사 본문
pub fn article_text() -> String {
    "Rivers carry water from the mountains to the sea and shape the land along the way. "
        .repeat(110)
        .chars()
        .take(8_500)
        .collect()
}

// ── 조립 ──

/// 파이프라인 전체와 각 가짜에 대한 핸들
pub struct Harness {
    pub service: StoryboardService,
    pub sessions: Arc<InMemorySessionStore>,
    pub text: Arc<ScriptedText>,
    pub images: Arc<FakeImages>,
    pub speech: Arc<FakeSpeech>,
    pub storage: Arc<MemoryStorage>,
    pub readme: Arc<FakeReadme>,
    pub enhancer: Option<Arc<FakeEnhancer>>,
    pub fetch_log: Arc<Mutex<Vec<&'static str>>>,
}

impl Harness {
    pub fn readme_calls(&self) -> usize {
        self.readme.calls.load(Ordering::SeqCst)
    }
}

pub struct HarnessBuilder {
    pub frames: usize,
    pub images: FakeImages,
    pub speech: FakeSpeech,
    pub tiers: Option<Vec<Arc<dyn PageSource>>>,
    pub readme: FakeReadme,
    pub enhancer: Option<FakeEnhancer>,
    pub default_voice: Option<String>,
    pub fetch_log: Arc<Mutex<Vec<&'static str>>>,
}

impl HarnessBuilder {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            images: FakeImages::default(),
            speech: FakeSpeech::default(),
            tiers: None,
            readme: FakeReadme::default(),
            enhancer: None,
            default_voice: None,
            fetch_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn images(mut self, images: FakeImages) -> Self {
        self.images = images;
        self
    }

    pub fn speech(mut self, speech: FakeSpeech) -> Self {
        self.speech = speech;
        self
    }

    pub fn tiers(mut self, tiers: Vec<Arc<dyn PageSource>>) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn readme(mut self, readme: FakeReadme) -> Self {
        self.readme = readme;
        self
    }

    pub fn enhancer(mut self, enhancer: FakeEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn build(self) -> Harness {
        let fetch_log = self.fetch_log;
        let tiers = self.tiers.unwrap_or_else(|| {
            vec![FakePage::ok(
                "direct",
                &article_text(),
                PageKind::Text,
                &fetch_log,
            )]
        });

        let text = Arc::new(ScriptedText::new(
            &analysis_json(self.frames as u32),
            &storyboard_json(self.frames),
        ));
        let images = Arc::new(self.images);
        let speech = Arc::new(self.speech);
        let storage = Arc::new(MemoryStorage::default());
        let sessions = Arc::new(InMemorySessionStore::new(chrono::Duration::hours(24)));
        let readme = Arc::new(self.readme);
        let enhancer = self.enhancer.map(Arc::new);

        let delay = Duration::from_millis(1);
        let audio = AudioGenerator::new(
            speech.clone(),
            storage.clone(),
            self.default_voice,
            AssetPolicy::audio(2, delay),
        );
        let service = StoryboardService::new(
            sessions.clone() as Arc<dyn SessionStore>,
            ContentAcquirer::new(tiers, readme.clone()),
            ContentAnalyzer::new(text.clone()),
            StoryboardSynthesizer::new(text.clone()),
            ImageGenerator::new(
                images.clone(),
                storage.clone(),
                enhancer.clone().map(|e| e as Arc<dyn TextGenerator>),
                AssetPolicy::image(2, delay),
            ),
            audio.clone(),
            FrameRephraser::new(text.clone(), audio),
        );

        Harness {
            service,
            sessions,
            text,
            images,
            speech,
            storage,
            readme,
            enhancer,
            fetch_log,
        }
    }
}
