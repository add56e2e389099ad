//! # 로컬 오브젝트 스토리지
//!
//! 생성된 이미지/오디오를 디스크에 저장하고 공개 URL을 돌려줍니다.
//! 저장 디렉토리는 라우터에서 `/media` 경로로 그대로 서빙됩니다 (`ServeDir`).
//!
//! 키 형식: `{sessionId}/frame{n}.{ext}`: 키가 곧 미디어 루트 기준 상대 경로입니다.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::clients::{ObjectStorage, ServiceError};

/// 디스크 기반 오브젝트 스토리지
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    /// 저장 루트 디렉토리 (예: "data/media")
    root: PathBuf,
    /// 공개 URL 접두어 (예: "http://localhost:3000")
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 키에 대응하는 공개 URL
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/media/{}", self.public_base_url, key)
    }
}

/// 키가 루트 밖으로 나가지 못하게 검사합니다.
///
/// 허용: `abc/frame1.png` / 거부: `../x`, `/etc/passwd`, 빈 문자열
pub fn validate_key(key: &str) -> Result<&Path, ServiceError> {
    let path = Path::new(key);
    let is_safe = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if is_safe {
        Ok(path)
    } else {
        Err(ServiceError::InvalidResponse(format!(
            "invalid object key '{}'",
            key
        )))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ServiceError> {
        let full_path = self.root.join(validate_key(key)?);

        // 부모 디렉토리(세션 디렉토리)가 없으면 생성합니다.
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, bytes).await?;

        Ok(self.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_escaping_keys() {
        assert!(validate_key("../secret").is_err());
        assert!(validate_key("/abs/path.png").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("session/frame1.png").is_ok());
    }

    #[tokio::test]
    async fn put_writes_file_and_returns_public_url() {
        let root = tempfile::tempdir().expect("tempdir");
        let storage = LocalObjectStorage::new(root.path(), "http://localhost:3000/");

        let url = storage
            .put("abc/frame1.png", vec![1, 2, 3], "image/png")
            .await
            .expect("put");

        assert_eq!(url, "http://localhost:3000/media/abc/frame1.png");
        let written = std::fs::read(root.path().join("abc/frame1.png")).expect("read");
        assert_eq!(written, vec![1, 2, 3]);
    }
}
