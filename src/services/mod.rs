//! # 서비스 계층
//!
//! HTTP 라우트와 분리된 비즈니스 로직 모음입니다.
//!
//! 각 하위 모듈:
//! - `clients` / `http` / `storage`: 외부 서비스 경계(트레이트)와 실제 구현
//! - `acquisition`: URL → 평문 (단계별 폴백 체인)
//! - `html_extract` / `json_extract`: 마크업 본문 추출, 생성 모델 출력의 JSON 추출
//! - `structure`: 코드 저장소 텍스트의 구조 요약
//! - `analyzer` / `synthesizer`: 분석, 스토리보드 합성
//! - `assets` / `images` / `audio`: 프레임 단위 에셋 생성 루프와 두 생성기
//! - `rephrase`: 프레임 하나의 내레이션 재작성
//! - `session_store`: 진행 중인 세션 저장소
//! - `pipeline`: 위 단계들을 묶은 파사드

pub mod acquisition;
pub mod analyzer;
pub mod assets;
pub mod audio;
pub mod clients;
pub mod html_extract;
pub mod http;
pub mod images;
pub mod json_extract;
pub mod pipeline;
pub mod rephrase;
pub mod session_store;
pub mod storage;
pub mod structure;
pub mod synthesizer;

pub use assets::{AssetPolicy, BatchReport};
pub use pipeline::StoryboardService;
pub use session_store::{InMemorySessionStore, SessionStore};
