//! # 프레임 단위 에셋 생성 루프
//!
//! 이미지 생성과 오디오 생성은 같은 모양의 루프를 공유합니다.
//!
//! ```text
//! for index in 0..N (순서대로, 하나씩)
//!   ├─ 최대 max_attempts번 시도 (사이에 고정 retry_delay 대기)
//!   ├─ 성공 → 곧바로 세션 frames[index]에 URL 기록
//!   ├─ 실패 → 로그만 남기고 다음 프레임으로
//!   └─ 요청 한도 초과 && halt_remaining_on_rate_limit → 남은 프레임 전부 중단
//! ```
//!
//! 프레임 하나의 실패는 절대 배치 전체를 실패시키지 않습니다.
//! 결과는 항상 `BatchReport { generated, total, halted }`로 보고됩니다.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clients::ServiceError;
use super::session_store::SessionStore;
use crate::error::AppError;
use crate::models::Frame;

/// 생성기별 재시도/중단 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPolicy {
    /// 프레임당 최대 시도 횟수 (1 이상)
    pub max_attempts: u32,
    /// 시도 사이의 고정 대기 시간
    pub retry_delay: Duration,
    /// 요청 한도 초과 신호를 받으면 남은 프레임을 모두 건너뛸지 여부
    pub halt_remaining_on_rate_limit: bool,
}

impl AssetPolicy {
    /// 이미지: 요청 한도 초과 시 남은 프레임 중단
    pub fn image(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
            halt_remaining_on_rate_limit: true,
        }
    }

    /// 오디오: 요청 한도 초과도 일반 실패와 똑같이 취급
    pub fn audio(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
            halt_remaining_on_rate_limit: false,
        }
    }
}

/// 배치 실행 결과: 응답 JSON: `{"generatedCount": 6, "totalCount": 7, "halted": false}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    #[serde(rename = "generatedCount")]
    pub generated: usize,
    #[serde(rename = "totalCount")]
    pub total: usize,
    /// 요청 한도 초과나 취소로 남은 프레임을 건너뛰었는지
    pub halted: bool,
}

/// 프레임의 어느 URL 필드를 채우는지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
        }
    }

    pub fn apply(&self, frame: &mut Frame, url: Option<String>) {
        match self {
            AssetKind::Image => frame.image_url = url,
            AssetKind::Audio => frame.audio_url = url,
        }
    }
}

/// 한 프레임에 대한 재시도 결과
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Succeeded(T),
    /// 시도 횟수를 모두 소진: 마지막 에러
    Exhausted(ServiceError),
    /// 배치 전체를 멈춰야 하는 요청 한도 초과
    RateLimited,
    Cancelled,
}

/// `op`를 정책에 따라 재시도합니다.
pub async fn attempt_with_retry<T, F, Fut>(
    policy: &AssetPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> AttemptOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        match op().await {
            Ok(value) => return AttemptOutcome::Succeeded(value),
            Err(ServiceError::Cancelled) => return AttemptOutcome::Cancelled,
            Err(err) if err.is_rate_limit() && policy.halt_remaining_on_rate_limit => {
                warn!("{} rate limited (attempt={})", label, attempt);
                return AttemptOutcome::RateLimited;
            }
            Err(err) => {
                warn!(
                    "{} failed (attempt={}/{}): {}",
                    label, attempt, policy.max_attempts, err
                );
                last_error = Some(err);
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
                _ = tokio::time::sleep(policy.retry_delay) => {}
            }
        }
    }

    AttemptOutcome::Exhausted(
        last_error.unwrap_or_else(|| ServiceError::InvalidResponse("no attempts made".into())),
    )
}

/// 세션의 모든 프레임에 대해 에셋을 생성합니다.
///
/// `generate(index)`는 합성 + 업로드까지 끝낸 공개 URL을 돌려줘야 합니다.
/// 성공한 프레임은 그 자리에서 세션에 기록되므로 배치 도중에 읽어도 진행 상황이 보입니다.
///
/// # 에러
/// 배치 도중 세션이 사라지면 `NotFound`. 프레임 실패는 에러가 아닙니다.
pub async fn run_batch<G, Fut>(
    store: &dyn SessionStore,
    session_id: &str,
    total: usize,
    kind: AssetKind,
    policy: &AssetPolicy,
    cancel: &CancellationToken,
    mut generate: G,
) -> Result<BatchReport, AppError>
where
    G: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<String, ServiceError>>,
{
    let mut report = BatchReport {
        generated: 0,
        total,
        halted: false,
    };

    for index in 0..total {
        let label = format!("{} generation (session_id={}, frame={})", kind.as_str(), session_id, index + 1);

        match attempt_with_retry(policy, cancel, &label, || generate(index)).await {
            AttemptOutcome::Succeeded(url) => {
                let mut url = Some(url);
                let found = store.update(session_id, &mut |session| {
                    if let Some(frame) = session.frames.get_mut(index) {
                        kind.apply(frame, url.take());
                    }
                });
                if !found {
                    return Err(AppError::NotFound);
                }
                report.generated += 1;
                debug!("{} stored", label);
            }
            AttemptOutcome::Exhausted(err) => {
                warn!("{} skipped after retries: {}", label, err);
            }
            AttemptOutcome::RateLimited => {
                warn!(
                    "{} hit rate limit, halting remaining {} frame(s)",
                    label,
                    total - index - 1
                );
                report.halted = true;
                break;
            }
            AttemptOutcome::Cancelled => {
                info!("{} cancelled", label);
                report.halted = true;
                break;
            }
        }
    }

    info!(
        "{} batch finished (session_id={}, generated={}/{}, halted={})",
        kind.as_str(),
        session_id,
        report.generated,
        report.total,
        report.halted
    );
    Ok(report)
}
