//! # 생성 모델 출력의 JSON 추출
//!
//! 생성 모델은 "JSON만 출력하라"는 지시를 받아도 설명 문장이나 코드 펜스(```json)를
//! 덧붙이는 일이 흔합니다. 그래서 파싱은 두 단계로 진행합니다.
//!
//! 1. 전체 응답(코드 펜스 제거 후)을 그대로 파싱
//! 2. 실패하면 균형 잡힌 첫 번째 `{...}` 부분 문자열을 찾아 파싱
//!
//! 두 번째 단계는 예외 상황이 아니라 평범한 분기입니다.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// 생성 모델 출력 파싱 실패
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response contains no JSON object")]
    NoObject,

    #[error("invalid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// 응답 텍스트에서 JSON 객체를 읽어 `T`로 변환합니다.
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let text = strip_code_fence(raw.trim());

    // 1단계: 그대로 파싱
    let direct_error = match serde_json::from_str::<T>(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    // 2단계: 균형 잡힌 {...} 후보들을 앞에서부터 시도
    let mut last_error = None;
    let mut offset = 0;
    while let Some((start, candidate)) = next_balanced_object(text, offset) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err),
        }
        offset = start + 1;
    }

    match last_error {
        Some(err) => Err(ParseError::Invalid(err)),
        // 중괄호 자체가 없으면 원래 에러보다 "객체 없음"이 더 정확한 진단입니다.
        None if !text.contains('{') => Err(ParseError::NoObject),
        None => Err(ParseError::Invalid(direct_error)),
    }
}

/// 텍스트에서 균형 잡힌 첫 번째 `{...}`를 찾습니다.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    next_balanced_object(text, 0).map(|(_, candidate)| candidate)
}

/// `from` 바이트 위치 이후의 첫 균형 객체와 그 시작 위치
///
/// 문자열 리터럴 안의 중괄호와 이스케이프된 따옴표는 깊이 계산에서 제외합니다.
fn next_balanced_object(text: &str, from: usize) -> Option<(usize, &str)> {
    let start = from + text.get(from..)?.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in text.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, &text[start..=i]));
                }
            }
            _ => {}
        }
    }

    // 이 위치에서 시작한 객체가 닫히지 않으면 뒤쪽 후보도 닫힐 수 없습니다.
    None
}

/// ```json ... ``` 코드 펜스를 벗겨냅니다.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 첫 줄의 언어 태그(json 등)를 건너뜁니다.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn parses_clean_json_directly() {
        let parsed: Sample = parse_json_object(r#"{"name":"a"}"#).unwrap();
        assert_eq!(parsed, Sample { name: "a".into() });
    }

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let raw = "Sure! Here is the JSON you asked for:\n{\"name\": \"b\"}\nLet me know.";
        let parsed: Sample = parse_json_object(raw).unwrap();
        assert_eq!(parsed.name, "b");
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"name\": \"c\"}\n```";
        let parsed: Sample = parse_json_object(raw).unwrap();
        assert_eq!(parsed.name, "c");
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let raw = r#"note: {"name": "has } brace and \" quote"} trailing"#;
        assert_eq!(
            first_balanced_object(raw),
            Some(r#"{"name": "has } brace and \" quote"}"#)
        );
    }

    #[test]
    fn skips_non_json_brace_groups() {
        let raw = "Use {curly} braces. {\"name\": \"d\"}";
        let parsed: Sample = parse_json_object(raw).unwrap();
        assert_eq!(parsed.name, "d");
    }

    #[test]
    fn reports_missing_object() {
        let result: Result<Sample, _> = parse_json_object("no json here");
        assert!(matches!(result, Err(ParseError::NoObject)));
    }

    #[test]
    fn unbalanced_object_is_not_extracted() {
        assert_eq!(first_balanced_object("{\"a\": {\"b\": 1}"), None);
    }
}
