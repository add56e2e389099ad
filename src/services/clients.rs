//! # 외부 서비스 경계
//!
//! 파이프라인이 의존하는 외부 서비스들을 트레이트로 정의합니다.
//! 실제 HTTP 구현은 `services::http`, 파일 기반 오브젝트 스토리지는 `services::storage`에 있고,
//! 테스트에서는 같은 트레이트를 구현한 가짜 객체를 주입합니다.
//!
//! 모든 트레이트는 `Send + Sync`이며 `Arc<dyn _>`으로 공유됩니다.

use async_trait::async_trait;
use thiserror::Error;

/// 외부 서비스 호출 실패
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 필요한 API 주소/키가 설정되지 않음
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out")]
    Timeout,

    /// 서비스가 요청 한도 초과를 알림 (HTTP 429 등)
    #[error("rate limited by upstream service")]
    RateLimited,

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// 호출 도중 요청이 취소됨
    #[error("cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// 요청 한도 초과 신호인지 확인합니다.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            ServiceError::RateLimited | ServiceError::Status { status: 429, .. }
        )
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            ServiceError::RateLimited
        } else {
            ServiceError::Http(err.to_string())
        }
    }
}

/// 텍스트 생성 서비스 — 프롬프트와 최대 출력 크기를 받아 생성된 텍스트를 돌려줍니다.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError>;
}

/// 이미지 합성 서비스
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, ServiceError>;

    /// 저장 경로에 붙일 확장자
    fn extension(&self) -> &'static str {
        "png"
    }

    fn content_type(&self) -> &'static str {
        "image/png"
    }
}

/// 음성 합성 서비스
///
/// `voice`가 None이면 구현체는 요청에서 음성 파라미터를 아예 빼야 합니다.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, ServiceError>;

    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }
}

/// 가져온 페이지 본문의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// 이미 정리된 평문
    Text,
    /// 구조 추출이 필요한 HTML
    Markup,
}

/// 콘텐츠 수집 단계 하나가 돌려준 본문
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: String,
    pub kind: PageKind,
}

/// 콘텐츠 수집 단계(tier) 하나
#[async_trait]
pub trait PageSource: Send + Sync {
    /// 로그에 남길 단계 이름
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ServiceError>;
}

/// 코드 호스팅 저장소의 README를 가져오는 서비스
#[async_trait]
pub trait ReadmeSource: Send + Sync {
    async fn fetch_readme(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<String, ServiceError>;
}

/// 오브젝트 스토리지: 키와 바이너리를 받아 저장하고 공개 URL을 돌려줍니다.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_counts_as_rate_limit() {
        assert!(ServiceError::RateLimited.is_rate_limit());
        assert!(ServiceError::Status {
            status: 429,
            body: String::new()
        }
        .is_rate_limit());
        assert!(!ServiceError::Status {
            status: 500,
            body: String::new()
        }
        .is_rate_limit());
        assert!(!ServiceError::Timeout.is_rate_limit());
    }
}
