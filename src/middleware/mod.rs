//! # 미들웨어
//!
//! - `auth`: Bearer 토큰 검증과 `AuthUser` 추출기

pub mod auth;

pub use auth::{AuthError, AuthUser, Identity, IdentityVerifier, JwtIdentityVerifier};
