//! # 콘텐츠 분석
//!
//! 원문을 주제/개념/복잡도/권장 프레임 수로 압축합니다.
//! 이 단계는 "조언"용이라서 실패하더라도 파이프라인을 멈추지 않고 고정 폴백 값을 돌려줍니다.

use std::sync::Arc;
use tracing::{info, warn};

use super::acquisition::truncate_chars;
use super::clients::TextGenerator;
use super::json_extract::parse_json_object;
use crate::models::AnalysisResult;

/// 분석 프롬프트에 넣을 원문 최대 길이
pub const ANALYSIS_INPUT_CHARS: usize = 6_000;
/// 분석 응답 최대 토큰
pub const ANALYSIS_MAX_TOKENS: u32 = 800;

/// 콘텐츠 분석기
#[derive(Clone)]
pub struct ContentAnalyzer {
    generator: Arc<dyn TextGenerator>,
}

impl ContentAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// 원문을 분석합니다. 호출이나 파싱이 실패하면 `AnalysisResult::fallback()`.
    pub async fn analyze(&self, text: &str) -> AnalysisResult {
        let prompt = analysis_prompt(&truncate_chars(text, ANALYSIS_INPUT_CHARS));

        let raw = match self.generator.generate(&prompt, ANALYSIS_MAX_TOKENS).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("analysis request failed, using fallback: {}", err);
                return AnalysisResult::fallback();
            }
        };

        match parse_json_object::<AnalysisResult>(&raw) {
            Ok(result) => {
                let result = result.normalized();
                info!(
                    "content analyzed (topics={}, complexity={}, frames={})",
                    result.topics.len(),
                    result.complexity,
                    result.recommended_frame_count
                );
                result
            }
            Err(err) => {
                warn!("analysis response unparseable, using fallback: {}", err);
                AnalysisResult::fallback()
            }
        }
    }
}

fn analysis_prompt(text: &str) -> String {
    format!(
        r#"Analyze the following content and respond with ONLY a JSON object, no prose and no code fences.

The JSON object must have exactly these fields:
{{
  "topics": ["main topic", "..."],
  "concepts": ["key concept", "..."],
  "summary": "two or three sentence summary",
  "complexity": "low" | "medium" | "high",
  "recommendedFrameCount": a whole number between 5 and 10
}}

Content:
"""
{text}
""""#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clients::ServiceError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Fixed(Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerator for Fixed {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ServiceError> {
            self.0
                .map(str::to_string)
                .map_err(|_| ServiceError::Timeout)
        }
    }

    fn analyzer(reply: Result<&'static str, ()>) -> ContentAnalyzer {
        ContentAnalyzer::new(Arc::new(Fixed(reply)))
    }

    #[tokio::test]
    async fn parses_json_wrapped_in_prose() {
        let reply = "Here you go:\n{\"topics\":[\"x\",\"y\"],\"recommendedFrameCount\":7,\"complexity\":\"Advanced\"}";
        let result = analyzer(Ok(reply)).analyze("some text").await;
        assert_eq!(result.topics, vec!["x", "y"]);
        assert_eq!(result.recommended_frame_count, 7);
        assert_eq!(result.complexity, "high");
    }

    #[tokio::test]
    async fn string_frame_count_does_not_discard_topics() {
        let reply = r#"{"topics":["tides","moon"],"recommendedFrameCount":"7"}"#;
        let result = analyzer(Ok(reply)).analyze("some text").await;
        assert_eq!(result.topics, vec!["tides", "moon"]);
        assert_eq!(result.recommended_frame_count, 7);
    }

    #[tokio::test]
    async fn service_failure_yields_fallback() {
        let result = analyzer(Err(())).analyze("some text").await;
        assert_eq!(result, AnalysisResult::fallback());
    }

    #[tokio::test]
    async fn garbage_reply_yields_fallback() {
        let result = analyzer(Ok("I cannot help with that.")).analyze("text").await;
        assert_eq!(result.recommended_frame_count, 6);
        assert_eq!(result.topics, vec!["General topic", "Key ideas"]);
    }

    #[test]
    fn prompt_uses_bounded_prefix() {
        let long = "a".repeat(ANALYSIS_INPUT_CHARS * 2);
        let prompt = analysis_prompt(&truncate_chars(&long, ANALYSIS_INPUT_CHARS));
        assert!(prompt.matches('a').count() < ANALYSIS_INPUT_CHARS + 200);
    }
}
