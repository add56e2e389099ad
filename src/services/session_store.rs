//! # 세션 저장소
//!
//! 진행 중인 생성 작업(`Session`)을 보관하는 키-값 저장소입니다.
//! 전역 상태 대신 트레이트로 추상화하여 생성자 주입(`Arc<dyn SessionStore>`)으로 전달합니다.
//! 나중에 분산 캐시로 바꾸더라도 파이프라인 코드는 그대로입니다.
//!
//! 기본 구현인 `InMemorySessionStore`는 `parking_lot::RwLock<HashMap>` 하나로 동기화합니다.
//! 모든 수정은 쓰기 락 안에서 일어나므로 같은 세션의 같은 프레임을 동시에 고쳐도
//! 상태가 깨지지 않습니다 (마지막 쓰기가 남습니다).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::Session;

/// 세션 저장소 인터페이스
pub trait SessionStore: Send + Sync {
    /// 세션을 저장하고 ID를 돌려줍니다.
    fn create(&self, session: Session) -> String;

    /// 세션 사본
    fn get(&self, id: &str) -> Option<Session>;

    /// 세션을 제자리에서 수정합니다. 세션이 없으면 false.
    fn update(&self, id: &str, apply: &mut dyn FnMut(&mut Session)) -> bool;

    fn delete(&self, id: &str) -> bool;

    /// 보존 기간이 지난 세션을 지우고 지운 개수를 돌려줍니다.
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 메모리 기반 세션 저장소
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: chrono::Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, session: Session) -> String {
        let id = session.id.clone();
        info!(
            "created session (session_id={}, steps={})",
            id,
            session.steps.len()
        );
        self.sessions.write().insert(id.clone(), session);
        id
    }

    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    fn update(&self, id: &str, apply: &mut dyn FnMut(&mut Session)) -> bool {
        match self.sessions.write().get_mut(id) {
            Some(session) => {
                apply(session);
                true
            }
            None => false,
        }
    }

    fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!("deleted session (session_id={})", id);
        }
        removed
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.ttl));
        before - sessions.len()
    }

    fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

/// 정리 주기의 하한. `tokio::time::interval`은 0을 받지 않습니다.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// 만료 세션 정리 작업을 백그라운드로 띄웁니다.
///
/// `token`이 취소되면 루프가 끝납니다 (서버 종료 시).
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        // 첫 tick은 즉시 완료되므로 건너뜁니다.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep(Utc::now());
                    if removed > 0 {
                        info!("swept expired sessions (removed={}, remaining={})", removed, store.len());
                    }
                }
            }
        }
    })
}
