//! # storyreel 웹 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 데이터베이스 연결 풀 생성과 마이그레이션
//! 4. 미디어 저장 디렉토리 생성
//! 5. 외부 서비스 클라이언트와 파이프라인 조립
//! 6. 만료 세션 정리 작업 시작
//! 7. HTTP 서버 시작 (Ctrl+C로 정상 종료)
//!
//! 모듈 선언은 `lib.rs`에 있고, 여기서는 `storyreel::...`로 가져다 씁니다.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyreel::config::Config;
use storyreel::middleware::JwtIdentityVerifier;
use storyreel::services::{
    acquisition::ContentAcquirer,
    analyzer::ContentAnalyzer,
    audio::AudioGenerator,
    clients::{PageSource, TextGenerator},
    http::{
        DirectPageSource, GithubReadmeSource, OpenAiImageSynthesizer, OpenAiSpeechSynthesizer,
        OpenAiTextGenerator, ProxyMode, ProxyPageSource,
    },
    images::ImageGenerator,
    rephrase::FrameRephraser,
    session_store::spawn_sweeper,
    storage::LocalObjectStorage,
    synthesizer::StoryboardSynthesizer,
    AssetPolicy, InMemorySessionStore, SessionStore, StoryboardService,
};
use storyreel::{build_router, AppState};

/// 생성 API 호출 하나의 타임아웃: 스토리보드 합성처럼 긴 응답도 여유 있게 기다립니다.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅(tracing) 초기화 ──
    // RUST_LOG가 없으면 storyreel, tower_http, axum 모듈을 debug 레벨로 설정
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyreel=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env()?;
    tracing::info!("Starting storyreel server on {}:{}", config.host, config.port);

    // ── 4단계: SQLite 연결 풀 + 마이그레이션 ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    // ── 5단계: 미디어 디렉토리 생성 ──
    // 생성된 이미지/오디오가 `{MEDIA_PATH}/{sessionId}/...`에 저장되고 `/media`로 서빙됩니다.
    let media_path = Path::new(&config.media_path);
    if !media_path.exists() {
        tokio::fs::create_dir_all(media_path).await?;
        tracing::info!("Created media directory: {}", config.media_path);
    }

    // ── 6단계: 외부 서비스 클라이언트 ──
    let text: Arc<dyn TextGenerator> =
        Arc::new(OpenAiTextGenerator::new(config.llm.clone(), GENERATION_TIMEOUT)?);
    let image_synth = Arc::new(OpenAiImageSynthesizer::new(
        config.image.clone(),
        config.image_size.clone(),
        GENERATION_TIMEOUT,
    )?);
    let speech_synth = Arc::new(OpenAiSpeechSynthesizer::new(
        config.tts.clone(),
        GENERATION_TIMEOUT,
    )?);
    let storage = Arc::new(LocalObjectStorage::new(
        &config.media_path,
        config.public_base_url.clone(),
    ));

    // 콘텐츠 수집 단계: 프록시(정리된 텍스트) → 프록시(원본 HTML) → 직접 요청
    let mut tiers: Vec<Arc<dyn PageSource>> = Vec::new();
    match &config.proxy {
        Some(proxy) => {
            tiers.push(Arc::new(ProxyPageSource::new(
                proxy.clone(),
                ProxyMode::Text,
                config.proxy_timeout,
            )?));
            tiers.push(Arc::new(ProxyPageSource::new(
                proxy.clone(),
                ProxyMode::Raw,
                config.proxy_timeout,
            )?));
        }
        None => tracing::warn!("Content proxy not configured, using direct fetch only"),
    }
    tiers.push(Arc::new(DirectPageSource::new(config.direct_fetch_timeout)?));
    let readme = Arc::new(GithubReadmeSource::new(config.direct_fetch_timeout)?);

    // ── 7단계: 파이프라인 조립 ──
    let sessions = Arc::new(InMemorySessionStore::new(config.session_ttl));
    let image_policy = AssetPolicy::image(config.asset_max_attempts, config.asset_retry_delay);
    let audio_policy = AssetPolicy::audio(config.asset_max_attempts, config.asset_retry_delay);
    let enhancer = config.enhance_image_prompts.then(|| text.clone());

    let audio = AudioGenerator::new(
        speech_synth,
        storage.clone(),
        config.tts_default_voice.clone(),
        audio_policy,
    );
    let service = StoryboardService::new(
        sessions.clone(),
        ContentAcquirer::new(tiers, readme),
        ContentAnalyzer::new(text.clone()),
        StoryboardSynthesizer::new(text.clone()),
        ImageGenerator::new(image_synth, storage, enhancer, image_policy),
        audio.clone(),
        FrameRephraser::new(text, audio),
    );

    // ── 8단계: 만료 세션 정리 작업 ──
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        sessions as Arc<dyn SessionStore>,
        config.session_sweep_interval,
        shutdown.clone(),
    );

    let state = AppState {
        pool,
        service,
        identity: Arc::new(JwtIdentityVerifier::new(&config.jwt_secret)),
        shutdown: shutdown.clone(),
    };
    let app = build_router(state, &config.media_path);

    // ── 9단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    sweeper.await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Ctrl+C를 기다렸다가 종료 토큰을 취소합니다.
///
/// 진행 중인 이미지/오디오 배치는 다음 프레임으로 넘어가기 전에 멈춥니다.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
