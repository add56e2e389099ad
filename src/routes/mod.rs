//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들과 공유 상태(`AppState`), 라우터 구성을 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `sessions`: 생성 세션 (생성, 조회, 이미지/오디오 생성, 재서술)
//! - `storyboards`: 저장된 스토리보드 (인증 필요)

pub mod health;
pub mod sessions;
pub mod storyboards;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::middleware::IdentityVerifier;
use crate::services::StoryboardService;

/// 모든 핸들러가 공유하는 상태
///
/// 모든 필드가 내부적으로 Arc이므로 clone 비용이 거의 없습니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (저장된 스토리보드)
    pub pool: SqlitePool,
    /// 생성 파이프라인과 세션 저장소
    pub service: StoryboardService,
    /// Bearer 토큰 검증기
    pub identity: Arc<dyn IdentityVerifier>,
    /// 서버 종료 신호: 요청마다 child token을 만들어 파이프라인에 넘깁니다.
    pub shutdown: CancellationToken,
}

/// `/api/v1` 아래의 모든 라우트
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{id}/images", post(sessions::generate_images))
        .route("/sessions/{id}/audio", post(sessions::generate_audio))
        .route(
            "/sessions/{id}/frames/{index}/rephrase",
            post(sessions::rephrase_frame),
        )
        .route(
            "/storyboards",
            get(storyboards::list_storyboards)
                .post(storyboards::save_storyboard)
                .delete(storyboards::delete_storyboard),
        )
        .route("/storyboards/lookup", get(storyboards::lookup_storyboard))
}

/// 전체 애플리케이션 라우터
///
/// - `/api/v1/*`: JSON API
/// - `/media/*`: 생성된 이미지/오디오 파일 (오브젝트 스토리지 루트)
pub fn build_router(state: AppState, media_path: impl Into<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes())
        .nest_service("/media", ServeDir::new(media_path.into()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
