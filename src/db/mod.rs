//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 라우트 핸들러(routes/)에서 이 모듈의 함수를 호출하여 DB 작업을 수행합니다.
//!
//! 각 하위 모듈:
//! - `storyboards`: 저장된 스토리보드와 소유자 집합 쿼리

pub mod storyboards;

// `crate::db::save_storyboard`처럼 바로 접근할 수 있게 재공개합니다.
pub use storyboards::*;
