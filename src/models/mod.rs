//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! - `analysis`: 콘텐츠 분석 결과와 코드 구조 요약
//! - `session`: 진행 중인 생성 세션, 스텝, 프레임, 스타일
//! - `storyboard`: 영구 저장된 스토리보드와 저장/삭제 결과
//!
//! `pub use X::*;`로 하위 모듈의 공개 항목을 재공개하여
//! `crate::models::Session`처럼 짧게 접근할 수 있게 합니다.

pub mod analysis;
pub mod session;
pub mod storyboard;

pub use analysis::*;
pub use session::*;
pub use storyboard::*;
