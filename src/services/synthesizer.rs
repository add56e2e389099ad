//! # 스토리보드 합성
//!
//! 분석 결과와 원문으로 `step1..stepN` 스텝을 만듭니다. 각 스텝은
//! - `visualScene`: 글자/라벨이 전혀 없는 순수 시각 묘사 (이미지 모델 입력)
//! - `narration`: 스타일에 맞춘 2~4문장 설명
//!
//! 으로 나뉩니다. 이 호출의 결과가 세션의 변하지 않는 뼈대가 되므로,
//! 쓸 수 있는 스텝이 하나도 없으면 재시도 없이 `Upstream` 에러로 끝납니다.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::acquisition::truncate_chars;
use super::clients::TextGenerator;
use super::json_extract::parse_json_object;
use crate::error::AppError;
use crate::models::{AnalysisResult, CodeStructure, Step, Style};

pub const MIN_FRAMES: u32 = 5;
pub const MAX_FRAMES: u32 = 10;
pub const SYNTHESIS_MAX_TOKENS: u32 = 4_000;

const VISUAL_KEYS: [&str; 4] = ["visualScene", "visual_scene", "visual", "scene"];
const NARRATION_KEYS: [&str; 3] = ["narration", "explanation", "text"];
/// 스텝 맵을 한 겹 감싸는 경우가 있어 벗겨낼 키들
const WRAPPER_KEYS: [&str; 3] = ["steps", "frames", "storyboard"];

/// 스토리보드 합성기
#[derive(Clone)]
pub struct StoryboardSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl StoryboardSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        analysis: &AnalysisResult,
        style: Style,
    ) -> Result<Vec<Step>, AppError> {
        let frame_count = target_frame_count(analysis.recommended_frame_count);
        let prompt = synthesis_prompt(text, analysis, style, frame_count);

        let raw = self
            .generator
            .generate(&prompt, SYNTHESIS_MAX_TOKENS)
            .await
            .map_err(|err| AppError::Upstream(format!("storyboard synthesis failed: {}", err)))?;

        let steps = parse_steps(&raw).map_err(|err| {
            warn!("storyboard synthesis output rejected: {}", err);
            AppError::Upstream(err)
        })?;

        info!(
            "storyboard synthesized (requested={}, received={}, style={})",
            frame_count,
            steps.len(),
            style
        );
        Ok(steps)
    }
}

/// 권장 프레임 수를 5..=10으로 맞춥니다.
pub fn target_frame_count(recommended: u32) -> u32 {
    recommended.clamp(MIN_FRAMES, MAX_FRAMES)
}

/// 모델 응답 → 정렬된 스텝 목록
///
/// 키는 숫자 접미사 순서(`step2` → `step10`)로 정렬하고, 비어 있는 항목은 버리고,
/// 최대 10개만 남긴 뒤 `step1`부터 다시 번호를 매깁니다.
pub fn parse_steps(raw: &str) -> Result<Vec<Step>, String> {
    let root: Map<String, Value> = parse_json_object(raw)
        .map_err(|err| format!("storyboard synthesis returned unparseable output ({})", err))?;

    let mut entries = unwrap_entries(root);
    entries.sort_by_key(|(key, _)| (numeric_suffix(key).unwrap_or(usize::MAX), key.clone()));

    let steps: Vec<Step> = entries
        .into_iter()
        .filter_map(|(_, value)| {
            let object = value.as_object()?;
            let visual_scene = first_text(object, &VISUAL_KEYS)?;
            let narration = first_text(object, &NARRATION_KEYS)?;
            Some((visual_scene, narration))
        })
        .take(MAX_FRAMES as usize)
        .enumerate()
        .map(|(index, (visual_scene, narration))| Step {
            key: format!("step{}", index + 1),
            visual_scene,
            narration,
        })
        .collect();

    if steps.is_empty() {
        return Err("storyboard synthesis returned no steps".to_string());
    }
    Ok(steps)
}

/// `{"steps": {...}}`/`{"steps": [...]}` 같은 한 겹 포장을 벗기고 (키, 값) 목록을 돌려줍니다.
fn unwrap_entries(mut root: Map<String, Value>) -> Vec<(String, Value)> {
    let wrapper = WRAPPER_KEYS.iter().find(|key| {
        root.len() == 1 && matches!(root.get(**key), Some(Value::Object(_) | Value::Array(_)))
    });

    match wrapper.and_then(|key| root.remove(*key)) {
        Some(Value::Object(inner)) => inner.into_iter().collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (format!("step{}", index + 1), item))
            .collect(),
        _ => root.into_iter().collect(),
    }
}

fn numeric_suffix(key: &str) -> Option<usize> {
    let digits_start = key.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    key[digits_start..].parse().ok()
}

fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key)?.as_str())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn synthesis_prompt(
    text: &str,
    analysis: &AnalysisResult,
    style: Style,
    frame_count: u32,
) -> String {
    let structure = analysis
        .structure
        .as_ref()
        .map(structure_context)
        .unwrap_or_default();

    format!(
        r#"Turn the content below into a storyboard of exactly {frame_count} frames.

Narration style: {tone}

Rules for every frame:
- "visualScene": a purely visual description for an illustrator. Absolutely no text, words, letters, labels, captions, signs or diagrams with writing. Keep the same implied characters, setting and art style as the previous frame so the frames read as one continuous story.
- "narration": 2 to 4 sentences that explain one idea from the content in the narration style above.

Respond with ONLY valid JSON, no prose before or after, in this shape:
{{"step1": {{"visualScene": "...", "narration": "..."}}, "step2": {{"visualScene": "...", "narration": "..."}}}}

Topics: {topics}
Key concepts: {concepts}
Summary: {summary}
{structure}
Content:
"""
{content}
""""#,
        tone = style.tone(),
        topics = analysis.topics.join(", "),
        concepts = analysis.concepts.join(", "),
        summary = analysis.summary,
        content = truncate_chars(text, super::acquisition::MAX_CONTENT_CHARS),
    )
}

fn structure_context(structure: &CodeStructure) -> String {
    format!(
        "Key components: {}\nKey functions: {}\nExecution flow: {}\n",
        structure.key_components.join(", "),
        structure.key_functions.join(", "),
        structure.execution_flow.join(" -> ")
    )
}
