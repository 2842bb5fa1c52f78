// src/storage.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Route prefix under which uploaded quiz images are served.
pub const IMAGE_ROUTE: &str = "/uploads/quiz-images";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    /// Path relative to the image root, e.g. `{quiz_id}/{file}`.
    pub path: String,
    pub public_url: String,
}

/// Where quiz images live.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(
        &self,
        quiz_id: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, AppError>;

    /// Returns `false` when the URL is not one of ours or the file is gone.
    async fn delete(&self, public_url: &str) -> Result<bool, AppError>;
}

/// Stores images on the local filesystem; `root` is served at [`IMAGE_ROUTE`].
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.public_base_url, IMAGE_ROUTE, path)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(
        &self,
        quiz_id: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, AppError> {
        let file_name = safe_file_name(
            original_name,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4(),
        );
        let dir = self.root.join(quiz_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        let path = format!("{}/{}", quiz_id, file_name);
        tracing::info!(path = %path, size = bytes.len(), "Stored quiz image");

        Ok(StoredImage {
            public_url: self.public_url(&path),
            path,
        })
    }

    async fn delete(&self, public_url: &str) -> Result<bool, AppError> {
        let Some(path) = path_from_public_url(public_url) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(self.root.join(&path)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(path = %path, "Failed to delete image: {}", e);
                Ok(false)
            }
        }
    }
}

/// Builds `{millis}-{uuid}.{ext}`, keeping the original extension only when
/// it is short and alphanumeric.
pub fn safe_file_name(original_name: &str, millis: i64, id: Uuid) -> String {
    let ext = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string());
    format!("{}-{}.{}", millis, id, ext)
}

/// Maps a public image URL back to its path under the image root.
pub fn path_from_public_url(public_url: &str) -> Option<String> {
    let parsed = url::Url::parse(public_url).ok()?;
    let marker = format!("{}/", IMAGE_ROUTE);
    let index = parsed.path().find(&marker)?;
    let relative = &parsed.path()[index + marker.len()..];

    let is_plain = !relative.is_empty()
        && Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    is_plain.then(|| relative.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        let id = Uuid::nil();
        assert_eq!(
            safe_file_name("Photo.JPG", 1700, id),
            format!("1700-{}.jpg", id)
        );
        assert_eq!(safe_file_name("noext", 1, id), format!("1-{}.png", id));
        assert_eq!(safe_file_name("weird.p/g", 1, id), format!("1-{}.png", id));
        assert_eq!(safe_file_name("trailing.", 1, id), format!("1-{}.png", id));
    }

    #[test]
    fn test_path_from_public_url() {
        assert_eq!(
            path_from_public_url("http://localhost:3000/uploads/quiz-images/abc/1-x.png"),
            Some("abc/1-x.png".to_string())
        );
        assert_eq!(path_from_public_url("http://localhost:3000/other/abc.png"), None);
        assert_eq!(path_from_public_url("not a url"), None);
        assert_eq!(path_from_public_url("http://h/uploads/quiz-images/"), None);
    }

    #[test]
    fn test_path_traversal_is_refused() {
        assert_eq!(
            path_from_public_url("http://h/uploads/quiz-images/%2E%2E/secret"),
            None
        );
        assert_eq!(
            path_from_public_url("http://h/uploads/quiz-images/a/../../etc/passwd"),
            None
        );
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let root = std::env::temp_dir().join(format!("quiz-images-{}", Uuid::new_v4()));
        let store = LocalImageStore::new(&root, "http://localhost:3000/");
        let quiz_id = Uuid::new_v4();

        let stored = store.upload(quiz_id, "cat.png", b"\x89PNG").await.unwrap();
        assert!(stored.path.starts_with(&quiz_id.to_string()));
        assert!(stored.public_url.starts_with("http://localhost:3000/uploads/quiz-images/"));
        assert!(root.join(&stored.path).exists());

        assert!(store.delete(&stored.public_url).await.unwrap());
        assert!(!root.join(&stored.path).exists());
        assert!(!store.delete(&stored.public_url).await.unwrap());

        let _ = std::fs::remove_dir_all(&root);
    }
}
