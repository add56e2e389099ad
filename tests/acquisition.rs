//! 콘텐츠 수집 단계별 폴백과 최소 길이 규칙

mod common;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use common::{article_text, FakePage, FakeReadme};
use storyreel::error::AppError;
use storyreel::services::acquisition::{ContentAcquirer, SourceKind, MAX_CONTENT_CHARS};
use storyreel::services::clients::PageKind;

fn log() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn acquirer(tiers: Vec<Arc<dyn storyreel::services::clients::PageSource>>) -> ContentAcquirer {
    ContentAcquirer::new(tiers, Arc::new(FakeReadme::default()))
}

#[tokio::test]
async fn falls_through_tiers_in_order() {
    let log = log();
    let markup = format!(
        "<html><body><nav>Home | About</nav><article><p>{}</p></article></body></html>",
        article_text()
    );
    let acquirer = acquirer(vec![
        FakePage::failing("proxy_text", &log),
        FakePage::ok("proxy_raw", &markup, PageKind::Markup, &log),
        FakePage::ok("direct", "never reached", PageKind::Text, &log),
    ]);

    let content = acquirer.fetch("https://example.com/article").await.unwrap();

    assert_eq!(*log.lock(), vec!["proxy_text", "proxy_raw"]);
    assert_eq!(content.kind, SourceKind::WebPage);
    assert!(content.text.starts_with("Rivers carry water"));
    assert!(!content.text.contains("Home | About"));
}

#[tokio::test]
async fn short_tier_output_counts_as_failure() {
    let log = log();
    let acquirer = acquirer(vec![
        FakePage::ok("proxy_text", "Please enable JavaScript.", PageKind::Text, &log),
        FakePage::failing("proxy_raw", &log),
        FakePage::ok("direct", &article_text(), PageKind::Text, &log),
    ]);

    let content = acquirer.fetch("https://example.com/article").await.unwrap();

    assert_eq!(*log.lock(), vec!["proxy_text", "proxy_raw", "direct"]);
    assert!(content.text.chars().count() > 8_000);
}

#[tokio::test]
async fn exhausted_tiers_report_extracted_bytes() {
    let log = log();
    let acquirer = acquirer(vec![
        FakePage::failing("proxy_text", &log),
        FakePage::ok("proxy_raw", "<html><body><p>Too short.</p></body></html>", PageKind::Markup, &log),
        FakePage::ok("direct", "tiny", PageKind::Text, &log),
    ]);

    let err = acquirer.fetch("https://example.com/article").await.unwrap_err();

    assert_eq!(*log.lock(), vec!["proxy_text", "proxy_raw", "direct"]);
    match err {
        AppError::InsufficientContent { extracted_bytes } => {
            assert_eq!(extracted_bytes, "Too short.".len())
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn all_tiers_failing_reports_zero_bytes() {
    let log = log();
    let acquirer = acquirer(vec![
        FakePage::failing("proxy_text", &log),
        FakePage::failing("proxy_raw", &log),
        FakePage::failing("direct", &log),
    ]);

    let err = acquirer.fetch("https://example.com/gone").await.unwrap_err();

    assert!(matches!(err, AppError::InsufficientContent { extracted_bytes: 0 }));
}

#[tokio::test]
async fn output_is_truncated() {
    let log = log();
    let long = "word ".repeat(4_000);
    let acquirer = acquirer(vec![FakePage::ok("direct", &long, PageKind::Text, &log)]);

    let content = acquirer.fetch("https://example.com/long").await.unwrap();

    assert_eq!(content.text.chars().count(), MAX_CONTENT_CHARS);
}

#[tokio::test]
async fn rejects_missing_or_non_http_urls() {
    let acquirer = acquirer(Vec::new());

    assert!(matches!(acquirer.fetch("  ").await, Err(AppError::BadRequest(_))));
    assert!(matches!(
        acquirer.fetch("ftp://example.com/file").await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn repository_without_readme_uses_placeholder() {
    let readme = Arc::new(FakeReadme::default());
    let acquirer = ContentAcquirer::new(Vec::new(), readme.clone());

    let content = acquirer
        .fetch("https://github.com/acme/widget")
        .await
        .unwrap();

    assert_eq!(content.kind, SourceKind::Repository);
    assert!(content.text.contains("acme/widget"));
    assert!(content.text.chars().count() >= 50);
    assert_eq!(readme.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn large_markup_is_extracted_off_the_runtime_thread() {
    let log = log();
    let rows: String = (0..4_000)
        .map(|i| format!("<div class=\"row item-{i}\" id=\"r{i}\"><span>row {i}</span></div>"))
        .collect();
    let markup = format!(
        "<html><body>{rows}<article><p>{}</p></article></body></html>",
        article_text()
    );
    let acquirer = acquirer(vec![FakePage::ok("direct", &markup, PageKind::Markup, &log)]);

    let heartbeat = tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        std::time::Instant::now()
    });
    let content = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        acquirer.fetch("https://example.com/big"),
    )
    .await
    .expect("extraction finished in time")
    .unwrap();
    let finished = std::time::Instant::now();

    assert!(content.text.starts_with("Rivers carry water"));
    assert!(heartbeat.await.unwrap() <= finished);
}
