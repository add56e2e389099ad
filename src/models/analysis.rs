//! # 콘텐츠 분석 결과 모델
//!
//! 분석 단계가 원문을 압축한 구조화 요약입니다.
//! 이 결과는 "조언"일 뿐이며, 분석 서비스가 실패하면 고정된 폴백 값이 사용됩니다.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 분석 서비스가 돌려주는 요약
///
/// 생성 모델이 필드 이름을 camelCase/snake_case 어느 쪽으로 쓰든 읽을 수 있도록
/// alias와 기본값을 넉넉히 둡니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, alias = "key_concepts", alias = "keyConcepts")]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub summary: String,
    /// "low" | "medium" | "high"
    #[serde(default = "default_complexity")]
    pub complexity: String,
    /// 숫자, 실수, 숫자 문자열 모두 받습니다. 읽을 수 없는 값은 폴백 프레임 수가 됩니다.
    #[serde(
        default = "default_frame_count",
        deserialize_with = "lenient_frame_count",
        alias = "recommended_frame_count",
        alias = "frameCount",
        alias = "frame_count"
    )]
    pub recommended_frame_count: u32,
    /// 코드 저장소 입력일 때만 채워지는 구조 요약
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<CodeStructure>,
}

fn default_complexity() -> String {
    "medium".to_string()
}

fn default_frame_count() -> u32 {
    AnalysisResult::FALLBACK_FRAME_COUNT
}

/// `7`, `7.0`, `"7"` → 7. 그 밖의 값은 필드만 폴백으로 두고 나머지 분석은 살립니다.
fn lenient_frame_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match &value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_count)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(whole_count),
        _ => None,
    };
    Ok(count
        .map(|n| n.min(u64::from(u32::MAX)) as u32)
        .unwrap_or_else(default_frame_count))
}

fn whole_count(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

impl AnalysisResult {
    pub const FALLBACK_FRAME_COUNT: u32 = 6;

    /// 분석 서비스 실패 시 사용하는 일반적인 결과
    pub fn fallback() -> Self {
        Self {
            topics: vec!["General topic".to_string(), "Key ideas".to_string()],
            concepts: vec!["Core concept".to_string()],
            summary: "General overview of the provided content.".to_string(),
            complexity: default_complexity(),
            recommended_frame_count: Self::FALLBACK_FRAME_COUNT,
            structure: None,
        }
    }

    /// 모델 출력의 자유로운 값을 정리합니다.
    pub fn normalized(mut self) -> Self {
        self.complexity = match self.complexity.trim().to_ascii_lowercase().as_str() {
            "low" | "simple" | "easy" | "beginner" => "low",
            "high" | "complex" | "hard" | "advanced" => "high",
            _ => "medium",
        }
        .to_string();
        self.topics.retain(|t| !t.trim().is_empty());
        self.concepts.retain(|c| !c.trim().is_empty());
        if self.recommended_frame_count == 0 {
            self.recommended_frame_count = Self::FALLBACK_FRAME_COUNT;
        }
        self
    }
}

/// 코드 저장소 텍스트에서 로컬로 추출한 구조 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStructure {
    pub key_components: Vec<String>,
    pub key_functions: Vec<String>,
    pub execution_flow: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame_count(raw: &str) -> u32 {
        let json = format!(r#"{{"topics": ["x", "y"], "recommendedFrameCount": {raw}}}"#);
        let result: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.topics, vec!["x", "y"]);
        result.recommended_frame_count
    }

    #[test]
    fn frame_count_accepts_numbers_floats_and_numeric_strings() {
        assert_eq!(frame_count("7"), 7);
        assert_eq!(frame_count("7.0"), 7);
        assert_eq!(frame_count(r#""8""#), 8);
        assert_eq!(frame_count(r#"" 9 ""#), 9);
    }

    #[test]
    fn unreadable_frame_count_keeps_the_rest_of_the_analysis() {
        assert_eq!(frame_count(r#""seven""#), AnalysisResult::FALLBACK_FRAME_COUNT);
        assert_eq!(frame_count("-3"), AnalysisResult::FALLBACK_FRAME_COUNT);
        assert_eq!(frame_count("null"), AnalysisResult::FALLBACK_FRAME_COUNT);
    }

    #[test]
    fn missing_frame_count_uses_fallback() {
        let result: AnalysisResult = serde_json::from_str(r#"{"topics": ["x"]}"#).unwrap();
        assert_eq!(result.recommended_frame_count, AnalysisResult::FALLBACK_FRAME_COUNT);
    }
}
