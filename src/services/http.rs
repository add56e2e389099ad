//! # 외부 서비스 HTTP 구현
//!
//! `services::clients`의 트레이트를 reqwest로 구현합니다.
//! - 텍스트/이미지/음성: OpenAI 호환 API (`/chat/completions`, `/images/generations`, `/audio/speech`)
//! - 콘텐츠 수집: 관리형 프록시(정리된 텍스트 / 원본 HTML)와 직접 요청
//! - 저장소 README: raw.githubusercontent.com
//!
//! 모든 클라이언트는 생성 시점에 타임아웃을 고정합니다.
//! 429 응답은 `ServiceError::RateLimited`로, 그 외 실패 상태는 `ServiceError::Status`로 바뀝니다.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::clients::{
    FetchedPage, ImageSynthesizer, PageKind, PageSource, ReadmeSource, ServiceError,
    SpeechSynthesizer, TextGenerator,
};
use super::html_extract::MAX_MARKUP_BYTES;
use crate::config::{ApiConfig, ProxyConfig};

/// 직접 요청에 사용하는 User-Agent: 어떤 서비스가 요청했는지 드러나게 합니다.
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; storyreel/",
    env!("CARGO_PKG_VERSION"),
    "; +https://github.com/storyreel)"
);

/// 에러 본문은 로그가 넘치지 않게 앞부분만 남깁니다.
const MAX_ERROR_BODY_CHARS: usize = 500;

fn build_client(timeout: Duration) -> Result<Client, ServiceError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// 응답 상태를 검사하여 실패 상태를 `ServiceError`로 바꿉니다.
async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(ServiceError::RateLimited);
    }
    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

/// 응답 본문을 최대 `limit` 바이트까지만 읽습니다. 넘는 부분은 받지 않고 버립니다.
async fn read_capped(mut response: Response, limit: usize) -> Result<String, ServiceError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - buffer.len();
        if chunk.len() >= room {
            buffer.extend_from_slice(&chunk[..room]);
            debug!("page body truncated at {} bytes", limit);
            break;
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn api_key<'a>(key: &'a Option<String>, what: &'static str) -> Result<&'a str, ServiceError> {
    key.as_deref().ok_or(ServiceError::NotConfigured(what))
}

// ── 텍스트 생성 ──

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI 호환 chat completions 클라이언트
#[derive(Debug, Clone)]
pub struct OpenAiTextGenerator {
    client: Client,
    config: ApiConfig,
}

impl OpenAiTextGenerator {
    pub fn new(config: ApiConfig, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            config,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        let key = api_key(&self.config.api_key, "text generation API key")?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: 0.7,
        };
        debug!(
            "text generation request (model={}, prompt_len={}, max_tokens={})",
            self.config.model,
            prompt.len(),
            max_tokens
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;
        let body: ChatResponse = ensure_success(response).await?.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidResponse("empty completion".to_string()))
    }
}

// ── 이미지 생성 ──

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

/// OpenAI 호환 이미지 생성 클라이언트
#[derive(Debug, Clone)]
pub struct OpenAiImageSynthesizer {
    client: Client,
    config: ApiConfig,
    size: String,
}

impl OpenAiImageSynthesizer {
    pub fn new(config: ApiConfig, size: String, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            config,
            size,
        })
    }
}

#[async_trait]
impl ImageSynthesizer for OpenAiImageSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, ServiceError> {
        let key = api_key(&self.config.api_key, "image API key")?;
        let request = ImageRequest {
            model: &self.config.model,
            prompt,
            n: 1,
            size: &self.size,
            response_format: "b64_json",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.config.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;
        let body: ImageResponse = ensure_success(response).await?.json().await?;
        let datum = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidResponse("no image returned".to_string()))?;

        match (datum.b64_json, datum.url) {
            (Some(encoded), _) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| ServiceError::InvalidResponse(format!("bad base64 image: {}", e))),
            // 일부 호환 서비스는 b64_json을 무시하고 URL만 줍니다.
            (None, Some(url)) => {
                let response = self.client.get(url).send().await?;
                Ok(ensure_success(response).await?.bytes().await?.to_vec())
            }
            (None, None) => Err(ServiceError::InvalidResponse(
                "image payload missing".to_string(),
            )),
        }
    }
}

// ── 음성 합성 ──

/// `/audio/speech` 요청 본문
///
/// `voice`가 None이면 직렬화에서 필드 자체가 빠집니다.
/// 일부 TTS 백엔드는 `"voice": null`을 거부합니다.
#[derive(Debug, Serialize)]
pub struct SpeechRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<&'a str>,
    pub response_format: &'static str,
}

/// OpenAI 호환 음성 합성 클라이언트
#[derive(Debug, Clone)]
pub struct OpenAiSpeechSynthesizer {
    client: Client,
    config: ApiConfig,
}

impl OpenAiSpeechSynthesizer {
    pub fn new(config: ApiConfig, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            config,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, ServiceError> {
        let key = api_key(&self.config.api_key, "speech API key")?;
        let request = SpeechRequest {
            model: &self.config.model,
            input: text,
            voice: voice.filter(|v| !v.trim().is_empty()),
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.config.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ServiceError::InvalidResponse("empty audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

// ── 콘텐츠 수집 ──

/// 프록시가 돌려줄 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// 프록시가 본문을 정리한 평문
    Text,
    /// 렌더링된 원본 HTML
    Raw,
}

/// 관리형 콘텐츠 수집 프록시 (`GET {base}?api_key=..&url=..[&output_format=text]`)
#[derive(Debug, Clone)]
pub struct ProxyPageSource {
    client: Client,
    config: ProxyConfig,
    mode: ProxyMode,
}

impl ProxyPageSource {
    pub fn new(config: ProxyConfig, mode: ProxyMode, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            config,
            mode,
        })
    }
}

#[async_trait]
impl PageSource for ProxyPageSource {
    fn name(&self) -> &'static str {
        match self.mode {
            ProxyMode::Text => "proxy_text",
            ProxyMode::Raw => "proxy_raw",
        }
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ServiceError> {
        let mut query = vec![("api_key", self.config.api_key.as_str()), ("url", url)];
        if self.mode == ProxyMode::Text {
            query.push(("output_format", "text"));
        }

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?;
        let body = read_capped(ensure_success(response).await?, MAX_MARKUP_BYTES).await?;
        let kind = match self.mode {
            ProxyMode::Text => PageKind::Text,
            ProxyMode::Raw => PageKind::Markup,
        };
        Ok(FetchedPage { body, kind })
    }
}

/// 인증 없이 URL을 직접 요청하는 마지막 단계
#[derive(Debug, Clone)]
pub struct DirectPageSource {
    client: Client,
}

impl DirectPageSource {
    pub fn new(timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl PageSource for DirectPageSource {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ServiceError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,text/plain;q=0.9")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let is_plain_text = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|ct| ct.starts_with("text/plain") || ct.starts_with("text/markdown"))
            .unwrap_or(false);
        let body = read_capped(response, MAX_MARKUP_BYTES).await?;
        let kind = if is_plain_text {
            PageKind::Text
        } else {
            PageKind::Markup
        };
        Ok(FetchedPage { body, kind })
    }
}

/// raw.githubusercontent.com에서 README.md를 가져옵니다.
#[derive(Debug, Clone)]
pub struct GithubReadmeSource {
    client: Client,
    raw_base: String,
}

impl GithubReadmeSource {
    pub fn new(timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            raw_base: "https://raw.githubusercontent.com".to_string(),
        })
    }
}

#[async_trait]
impl ReadmeSource for GithubReadmeSource {
    async fn fetch_readme(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/{}/{}/{}/README.md", self.raw_base, owner, repo, branch);
        let response = self.client.get(&url).send().await?;
        let text = ensure_success(response).await?.text().await?;
        if text.trim().is_empty() {
            warn!("README is empty (url={})", url);
            return Err(ServiceError::InvalidResponse("empty README".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn speech_request_omits_absent_voice() {
        let request = SpeechRequest {
            model: "tts-1",
            input: "hello",
            voice: None,
            response_format: "mp3",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.as_object().unwrap().get("voice").is_none());
        assert_eq!(value["input"], "hello");
    }

    #[test]
    fn speech_request_includes_selected_voice() {
        let request = SpeechRequest {
            model: "tts-1",
            input: "hello",
            voice: Some("alloy"),
            response_format: "mp3",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["voice"], "alloy");
    }

    #[test]
    fn user_agent_names_the_service() {
        assert!(USER_AGENT.contains("storyreel/"));
    }
}
