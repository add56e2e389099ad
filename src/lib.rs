//! # storyreel
//!
//! 웹 페이지나 코드 저장소 URL을 받아 "스토리보드"(그림 + 내레이션 프레임 묶음)로 바꾸는 백엔드입니다.
//!
//! 바이너리(`main.rs`)는 이 라이브러리를 조립해서 서버를 띄우고,
//! `tests/`의 통합 테스트는 같은 모듈을 가짜 외부 서비스와 함께 조립합니다.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use routes::{build_router, AppState};
