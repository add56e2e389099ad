//! # HTML 본문 추출
//!
//! 프록시 원본 모드나 직접 요청이 돌려준 마크업에서 읽을 만한 본문만 뽑아냅니다.
//!
//! ## 처리 순서
//! 1. 주석과 본문이 아닌 요소(script, style, nav, header, footer, …)를 통째로 제거
//! 2. 의미 있는 본문 컨테이너를 우선순위대로 시도
//!    (`article` → `main` → `[role="main"]` → `.content` → `.post-content` → …)
//! 3. 텍스트가 `MIN_CONTAINER_CHARS` 이상인 첫 컨테이너를 사용
//! 4. 그런 컨테이너가 없으면 `<body>` 전체(없으면 문서 전체)를 사용
//!
//! 마크업 → 텍스트 변환은 html2text가 담당하고, 공백은 마지막에 정리합니다.
//!
//! 태그는 문서 전체에서 한 번만 훑어 요소 범위를 계산합니다. 모든 정규식은 처음 한 번만 컴파일됩니다.
//! CPU를 오래 쓰는 작업이므로 비동기 코드에서는 `spawn_blocking` 안에서 호출합니다.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// 컨테이너를 본문으로 인정하는 최소 글자 수
pub const MIN_CONTAINER_CHARS: usize = 100;

/// 추출 대상 마크업의 최대 크기. 넘는 부분은 버립니다.
pub const MAX_MARKUP_BYTES: usize = 2 * 1024 * 1024;

/// 선택자 하나당 검사할 후보 컨테이너 수
const MAX_CANDIDATES_PER_SELECTOR: usize = 64;

/// 짝이 없는 닫는 태그를 만났을 때 열린 요소 스택을 거슬러 올라갈 최대 깊이
const MAX_UNWIND_DEPTH: usize = 256;

/// html2text 줄바꿈 폭: 문단 안에서 줄이 잘리지 않도록 넉넉하게
const RENDER_WIDTH: usize = 1_000;

/// 통째로 제거할 요소들
const NON_CONTENT_TAGS: [&str; 10] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "svg", "iframe",
];

/// 닫는 태그가 없는 요소들
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

static NON_CONTENT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NON_CONTENT_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("valid element regex")
        })
        .collect()
});

/// 여는/닫는/자기 닫는 태그: (`/`, 태그 이름, 속성, 끝의 `/`)
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)([a-z][a-z0-9]*)\b([^>]*?)(/?)>").expect("valid tag regex")
});

static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*?)(?:</body\s*>|$)").expect("valid body regex"));

fn attribute_regex(name: &str) -> Regex {
    Regex::new(&format!(r#"(?i)(?:^|\s){name}\s*=\s*(?:"([^"]*)"|'([^']*)')"#))
        .expect("valid attribute regex")
}

static ROLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("role"));
static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("class"));
static ID_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("id"));

/// 본문 컨테이너 선택자 (우선순위 순)
#[derive(Debug, Clone, Copy)]
enum Selector {
    Tag(&'static str),
    Role(&'static str),
    Class(&'static str),
    Id(&'static str),
}

const CONTAINER_SELECTORS: [Selector; 8] = [
    Selector::Tag("article"),
    Selector::Tag("main"),
    Selector::Role("main"),
    Selector::Class("content"),
    Selector::Class("post-content"),
    Selector::Class("entry-content"),
    Selector::Class("article-body"),
    Selector::Id("content"),
];

/// 문서 안의 요소 하나 (여는 태그 기준)
#[derive(Debug)]
struct Element<'a> {
    tag: &'a str,
    role: Option<&'a str>,
    class: Option<&'a str>,
    id: Option<&'a str>,
    /// 여는 태그 끝부터 짝이 맞는 닫는 태그 시작까지. 닫히지 않으면 문서 끝까지.
    inner: Range<usize>,
}

impl Selector {
    fn matches(&self, element: &Element<'_>) -> bool {
        match self {
            Selector::Tag(name) => element.tag.eq_ignore_ascii_case(name),
            Selector::Role(role) => element
                .role
                .map(|value| value.eq_ignore_ascii_case(role))
                .unwrap_or(false),
            Selector::Class(class) => element
                .class
                .map(|value| value.split_whitespace().any(|c| c == *class))
                .unwrap_or(false),
            Selector::Id(id) => element.id.map(|value| value == *id).unwrap_or(false),
        }
    }
}

/// 속성 문자열에서 값을 찾습니다.
fn attribute<'a>(attrs: &'a str, re: &Regex) -> Option<&'a str> {
    let caps = re.captures(attrs)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// UTF-8 경계를 지키며 `max_bytes` 이하로 자릅니다.
pub fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// 마크업에서 본문 텍스트를 추출합니다.
pub fn extract_main_text(html: &str) -> String {
    let cleaned = strip_non_content(truncate_bytes(html, MAX_MARKUP_BYTES));
    let elements = scan_elements(&cleaned);

    for selector in CONTAINER_SELECTORS {
        let candidates = elements
            .iter()
            .filter(|element| selector.matches(element))
            .take(MAX_CANDIDATES_PER_SELECTOR);
        for element in candidates {
            let inner = &cleaned[element.inner.clone()];
            // 텍스트는 마크업보다 길어지지 않습니다.
            if inner.len() < MIN_CONTAINER_CHARS {
                continue;
            }
            let text = html_to_text(inner);
            if text.chars().count() >= MIN_CONTAINER_CHARS {
                tracing::debug!("content container matched ({:?})", selector);
                return text;
            }
        }
    }

    let body = BODY_RE
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(&cleaned);
    html_to_text(body)
}

/// 주석과 본문이 아닌 요소를 제거합니다.
pub fn strip_non_content(html: &str) -> String {
    let mut cleaned = COMMENT_RE.replace_all(html, " ").into_owned();
    for re in NON_CONTENT_RES.iter() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    cleaned
}

/// 태그를 한 번 훑으며 모든 요소의 내부 범위를 문서 순서대로 계산합니다.
///
/// 닫는 태그는 열린 요소 스택에서 같은 이름을 찾아 짝을 맞추고,
/// 그 위에 남은(닫히지 않은) 요소들도 같은 지점에서 닫습니다.
fn scan_elements(html: &str) -> Vec<Element<'_>> {
    let mut elements: Vec<Element<'_>> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    for caps in TAG_RE.captures_iter(html) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let tag = name.as_str();
        let is_closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());

        if is_closing {
            let found = open
                .iter()
                .rev()
                .take(MAX_UNWIND_DEPTH)
                .position(|&i| elements[i].tag.eq_ignore_ascii_case(tag));
            if let Some(offset) = found {
                let keep = open.len() - offset - 1;
                for i in open.drain(keep..) {
                    elements[i].inner.end = whole.start();
                }
            }
            continue;
        }

        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let is_self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty())
            || VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(tag));

        let start = whole.end();
        let index = elements.len();
        elements.push(Element {
            tag,
            role: attribute(attrs, &ROLE_ATTR_RE),
            class: attribute(attrs, &CLASS_ATTR_RE),
            id: attribute(attrs, &ID_ATTR_RE),
            inner: start..if is_self_closing { start } else { html.len() },
        });
        if !is_self_closing {
            open.push(index);
        }
    }

    elements
}

/// 마크업 조각 → 정리된 평문
pub fn html_to_text(fragment: &str) -> String {
    let rendered = html2text::from_read_with_decorator(
        fragment.as_bytes(),
        RENDER_WIDTH,
        html2text::render::text_renderer::TrivialDecorator::new(),
    );
    collapse_whitespace(&rendered)
}

/// 줄 안의 연속 공백은 하나로, 빈 줄은 제거합니다.
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
