//! # 콘텐츠 수집 (Content Acquisition)
//!
//! 입력 URL을 평문으로 바꿉니다. URL 종류에 따라 두 경로가 있습니다.
//!
//! ## 코드 저장소 URL (github.com/{owner}/{repo})
//! ```text
//! README (main 브랜치) → README (master 브랜치) → 고정 안내 문구
//! ```
//! 이 경로는 절대 실패하지 않습니다.
//!
//! ## 그 밖의 URL: 단계별 폴백 체인
//! ```text
//! [1] 프록시(정리된 텍스트) → [2] 프록시(원본 HTML) → [3] 직접 요청
//! ```
//! 각 단계는 자체 타임아웃을 가지며, 실패하면 같은 단계를 재시도하지 않고 다음 단계로 넘어갑니다.
//! 본문이 최소 길이(`MIN_CONTENT_CHARS`)에 못 미치는 것도 실패로 취급합니다.
//! 모든 단계가 실패하면 실제로 추출한 바이트 수를 담아 `InsufficientContent`를 반환합니다.
//! HTML 본문 추출은 런타임 워커를 막지 않도록 블로킹 스레드에서 실행합니다.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::clients::{PageKind, PageSource, ReadmeSource};
use super::html_extract::{collapse_whitespace, extract_main_text, truncate_bytes, MAX_MARKUP_BYTES};
use crate::error::AppError;

/// 하위 단계의 토큰 한도를 지키기 위한 최대 글자 수
pub const MAX_CONTENT_CHARS: usize = 10_000;
/// 이보다 짧은 본문은 스토리보드를 만들기에 부족합니다.
pub const MIN_CONTENT_CHARS: usize = 50;
/// README를 찾아볼 브랜치 순서
pub const README_BRANCHES: [&str; 2] = ["main", "master"];

static REPOSITORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s#?]+)")
        .expect("valid repository regex")
});

/// 코드 저장소 식별자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
}

/// URL이 코드 저장소를 가리키면 owner/repo를 돌려줍니다.
pub fn parse_repository_url(url: &str) -> Option<RepositoryRef> {
    let caps = REPOSITORY_RE.captures(url.trim())?;
    let owner = caps.get(1)?.as_str().to_string();
    let repo = caps.get(2)?.as_str().trim_end_matches(".git").to_string();
    if repo.is_empty() {
        return None;
    }
    Some(RepositoryRef { owner, repo })
}

/// 수집한 콘텐츠의 출처 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    WebPage,
    Repository,
}

/// 수집 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredContent {
    /// 최대 `MAX_CONTENT_CHARS`자로 잘린 평문
    pub text: String,
    pub kind: SourceKind,
}

/// 콘텐츠 수집기
///
/// `tiers`는 시도 순서대로 나열합니다. 프록시가 설정되지 않았다면 직접 요청 단계만 들어갑니다.
#[derive(Clone)]
pub struct ContentAcquirer {
    tiers: Vec<Arc<dyn PageSource>>,
    readme: Arc<dyn ReadmeSource>,
}

impl ContentAcquirer {
    pub fn new(tiers: Vec<Arc<dyn PageSource>>, readme: Arc<dyn ReadmeSource>) -> Self {
        Self { tiers, readme }
    }

    /// URL을 평문으로 바꿉니다.
    ///
    /// # 에러
    /// - URL이 비었거나 http(s)가 아니면 `BadRequest`
    /// - 모든 단계가 실패하면 `InsufficientContent { extracted_bytes }`
    pub async fn fetch(&self, url: &str) -> Result<AcquiredContent, AppError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::BadRequest("sourceUrl is required".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::BadRequest(format!(
                "sourceUrl must be an http(s) URL: {}",
                url
            )));
        }

        if let Some(repository) = parse_repository_url(url) {
            return Ok(self.fetch_repository(&repository).await);
        }
        self.fetch_web_page(url).await
    }

    async fn fetch_repository(&self, repository: &RepositoryRef) -> AcquiredContent {
        for branch in README_BRANCHES {
            match self
                .readme
                .fetch_readme(&repository.owner, &repository.repo, branch)
                .await
            {
                Ok(readme) if readme.trim().chars().count() >= MIN_CONTENT_CHARS => {
                    info!(
                        "fetched README (repo={}/{}, branch={}, len={})",
                        repository.owner,
                        repository.repo,
                        branch,
                        readme.len()
                    );
                    return AcquiredContent {
                        text: truncate_chars(readme.trim(), MAX_CONTENT_CHARS),
                        kind: SourceKind::Repository,
                    };
                }
                Ok(_) => warn!(
                    "README too short (repo={}/{}, branch={})",
                    repository.owner, repository.repo, branch
                ),
                Err(err) => warn!(
                    "README fetch failed (repo={}/{}, branch={}): {}",
                    repository.owner, repository.repo, branch, err
                ),
            }
        }

        warn!(
            "using placeholder for repository {}/{}",
            repository.owner, repository.repo
        );
        AcquiredContent {
            text: repository_placeholder(repository),
            kind: SourceKind::Repository,
        }
    }

    async fn fetch_web_page(&self, url: &str) -> Result<AcquiredContent, AppError> {
        // 진단용: 지금까지 추출한 본문 중 가장 긴 것의 바이트 수
        let mut best_extracted = 0usize;

        for tier in &self.tiers {
            let page = match tier.fetch(url).await {
                Ok(page) => page,
                Err(err) => {
                    warn!("acquisition tier failed (tier={}, url={}): {}", tier.name(), url, err);
                    continue;
                }
            };

            let text = match page.kind {
                PageKind::Text if !looks_like_markup(&page.body) => {
                    collapse_whitespace(truncate_bytes(&page.body, MAX_MARKUP_BYTES))
                }
                _ => {
                    let body = page.body;
                    match tokio::task::spawn_blocking(move || extract_main_text(&body)).await {
                        Ok(text) => text,
                        Err(err) => {
                            warn!("markup extraction failed (tier={}, url={}): {}", tier.name(), url, err);
                            continue;
                        }
                    }
                }
            };
            let chars = text.chars().count();
            best_extracted = best_extracted.max(text.len());

            if chars >= MIN_CONTENT_CHARS {
                info!(
                    "acquired content (tier={}, url={}, chars={})",
                    tier.name(),
                    url,
                    chars
                );
                return Ok(AcquiredContent {
                    text: truncate_chars(&text, MAX_CONTENT_CHARS),
                    kind: SourceKind::WebPage,
                });
            }
            warn!(
                "acquisition tier returned too little content (tier={}, url={}, chars={})",
                tier.name(),
                url,
                chars
            );
        }

        debug!("all acquisition tiers exhausted (url={})", url);
        Err(AppError::InsufficientContent {
            extracted_bytes: best_extracted,
        })
    }
}

/// README를 얻지 못했을 때 사용하는 안내 문구
pub fn repository_placeholder(repository: &RepositoryRef) -> String {
    format!(
        "Repository {}/{}: a software project hosted on GitHub. No README content could be retrieved.",
        repository.owner, repository.repo
    )
}

/// "정리된 텍스트"라고 받은 본문이 실제로는 HTML인 경우를 걸러냅니다.
fn looks_like_markup(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(512).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

/// 글자(char) 경계를 지키며 자릅니다.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recognises_repository_urls() {
        assert_eq!(
            parse_repository_url("https://github.com/rust-lang/rust.git"),
            Some(RepositoryRef {
                owner: "rust-lang".into(),
                repo: "rust".into()
            })
        );
        assert_eq!(
            parse_repository_url("https://www.github.com/tokio-rs/axum/tree/main").map(|r| r.repo),
            Some("axum".to_string())
        );
        assert_eq!(parse_repository_url("https://github.com/rust-lang"), None);
        assert_eq!(parse_repository_url("https://example.com/a/b"), None);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn placeholder_clears_the_content_floor() {
        let placeholder = repository_placeholder(&RepositoryRef {
            owner: "a".into(),
            repo: "b".into(),
        });
        assert!(placeholder.chars().count() >= MIN_CONTENT_CHARS);
    }

    #[test]
    fn detects_html_disguised_as_text() {
        assert!(looks_like_markup("  <!DOCTYPE html><html>"));
        assert!(!looks_like_markup("Plain article text with a < sign"));
    }
}
