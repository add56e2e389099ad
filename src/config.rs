//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 필수 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (저장된 스토리보드)
//! - `JWT_SECRET`: Bearer 토큰 검증에 사용할 비밀키
//!
//! 나머지는 모두 기본값이 있습니다. 외부 서비스 키가 없으면 해당 단계는
//! "설정되지 않음" 에러를 내고, 파이프라인은 각 단계의 폴백 규칙대로 동작합니다.

use std::env;
use std::time::Duration;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후 서비스 구성에 사용됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/storyreel.db?mode=rwc")
    pub database_url: String,
    /// JWT 서명 검증용 비밀키
    pub jwt_secret: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    /// 생성된 이미지/오디오가 저장되는 디렉토리 (오브젝트 스토리지 루트)
    pub media_path: String,
    /// 공개 미디어 URL의 접두어 (예: "https://storyreel.example.com")
    pub public_base_url: String,

    /// 텍스트 생성 서비스 (OpenAI 호환 chat completions)
    pub llm: ApiConfig,
    /// 이미지 생성 서비스
    pub image: ApiConfig,
    /// 이미지 크기 (예: "1024x1024")
    pub image_size: String,
    /// 음성 합성 서비스
    pub tts: ApiConfig,
    /// 음성을 지정하지 않았을 때 사용할 기본 음성: None이면 서비스 기본값
    pub tts_default_voice: Option<String>,

    /// 콘텐츠 수집 프록시: None이면 직접 요청 단계만 사용
    pub proxy: Option<ProxyConfig>,
    /// 프록시 단계별 타임아웃
    pub proxy_timeout: Duration,
    /// 직접 요청 단계 타임아웃
    pub direct_fetch_timeout: Duration,

    /// 세션 보존 기간
    pub session_ttl: chrono::Duration,
    /// 만료 세션 정리 주기
    pub session_sweep_interval: Duration,

    /// 프레임당 최대 생성 시도 횟수
    pub asset_max_attempts: u32,
    /// 재시도 사이의 고정 대기 시간
    pub asset_retry_delay: Duration,
    /// 이미지 프롬프트 보강 단계 사용 여부
    pub enhance_image_prompts: bool,
}

/// 외부 생성 API 하나의 접속 정보
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// 콘텐츠 수집 프록시 접속 정보
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 값이 없거나 파싱할 수 없으면 기본값을 사용합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        let llm = ApiConfig {
            base_url: var_or("LLM_API_BASE", "https://api.openai.com/v1"),
            api_key: optional_var("LLM_API_KEY"),
            model: var_or("LLM_MODEL", "gpt-4o-mini"),
        };

        // 이미지/음성 API는 따로 지정하지 않으면 텍스트 API의 주소와 키를 재사용합니다.
        let image = ApiConfig {
            base_url: optional_var("IMAGE_API_BASE").unwrap_or_else(|| llm.base_url.clone()),
            api_key: optional_var("IMAGE_API_KEY").or_else(|| llm.api_key.clone()),
            model: var_or("IMAGE_MODEL", "dall-e-3"),
        };
        let tts = ApiConfig {
            base_url: optional_var("TTS_API_BASE").unwrap_or_else(|| llm.base_url.clone()),
            api_key: optional_var("TTS_API_KEY").or_else(|| llm.api_key.clone()),
            model: var_or("TTS_MODEL", "tts-1"),
        };

        // 프록시는 주소와 키가 모두 있어야 활성화됩니다.
        let proxy = match (optional_var("PROXY_API_BASE"), optional_var("PROXY_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(ProxyConfig { base_url, api_key }),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            host: var_or("HOST", "0.0.0.0"),
            port: parsed_or("PORT", 3000),
            media_path: var_or("MEDIA_PATH", "data/media"),
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            llm,
            image,
            image_size: var_or("IMAGE_SIZE", "1024x1024"),
            tts,
            tts_default_voice: optional_var("TTS_DEFAULT_VOICE"),
            proxy,
            proxy_timeout: Duration::from_secs(parsed_or("PROXY_TIMEOUT_SECS", 55)),
            direct_fetch_timeout: Duration::from_secs(parsed_or("DIRECT_FETCH_TIMEOUT_SECS", 30)),
            session_ttl: chrono::Duration::hours(parsed_or("SESSION_TTL_HOURS", 24)),
            // 0초 주기는 허용하지 않습니다.
            session_sweep_interval: Duration::from_secs(
                parsed_or("SESSION_SWEEP_SECS", 600u64).max(1),
            ),
            asset_max_attempts: parsed_or("ASSET_MAX_ATTEMPTS", 2u32).max(1),
            asset_retry_delay: Duration::from_millis(parsed_or("ASSET_RETRY_DELAY_MS", 1500)),
            enhance_image_prompts: parsed_or("ENHANCE_IMAGE_PROMPTS", true),
        })
    }
}

/// 값이 없으면 기본 문자열을 사용합니다.
fn var_or(key: &str, default: &str) -> String {
    optional_var(key).unwrap_or_else(|| default.to_string())
}

/// 비어 있는 값은 "없음"으로 취급합니다.
fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 문자열 → 숫자/불리언 변환. 파싱 실패 시 기본값.
fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    optional_var(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
