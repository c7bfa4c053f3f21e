//! Object storage for the `images` bucket: a local-directory implementation
//! served by the HTTP layer, and an in-memory one for tests.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ObjectStorage, StoreError, StoreResult, StoredObject};

fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Rejects absolute paths and `..` segments.
fn checked_relative(path: &str) -> StoreResult<&Path> {
    let p = Path::new(path);
    if p.components().all(|c| matches!(c, Component::Normal(_))) {
        Ok(p)
    } else {
        Err(StoreError::Storage(format!("invalid object path '{}'", path)))
    }
}

/// Stores objects as files under `root`; `public_base` is the URL prefix the
/// directory is served from.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, path: &str, bytes: &[u8], _content_type: &str) -> StoreResult<()> {
        let target = self.root.join(checked_relative(path)?);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<StoredObject>> {
        let prefix = prefix.trim_matches('/');
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(checked_relative(prefix)?)
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut objects = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            objects.push(StoredObject {
                content_type: content_type_for(&path).map(str::to_string),
                path,
                size: metadata.len(),
                created_at,
            });
        }
        objects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(objects)
    }

    async fn remove(&self, paths: &[String]) -> StoreResult<()> {
        for path in paths {
            let target = self.root.join(checked_relative(path)?);
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Storage(e.to_string())),
            }
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}

struct MemoryObject {
    bytes: Vec<u8>,
    content_type: String,
    created_at: DateTime<Utc>,
}

/// In-memory bucket; removals can be made to fail to exercise best-effort
/// cleanup paths.
pub struct MemoryObjectStorage {
    objects: RwLock<BTreeMap<String, MemoryObject>>,
    public_base: String,
    fail_removals: AtomicBool,
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new("/uploads")
    }
}

impl MemoryObjectStorage {
    pub fn new(public_base: &str) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            public_base: public_base.trim_end_matches('/').to_string(),
            fail_removals: AtomicBool::new(false),
        }
    }

    pub fn set_fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> StoreResult<()> {
        checked_relative(path)?;
        self.objects.write().await.insert(
            path.to_string(),
            MemoryObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<StoredObject>> {
        let prefix = prefix.trim_matches('/');
        let objects = self.objects.read().await;
        let mut listed: Vec<StoredObject> = objects
            .iter()
            .filter(|(path, _)| {
                let parent = path.rsplit_once('/').map_or("", |(dir, _)| dir);
                parent == prefix
            })
            .map(|(path, obj)| StoredObject {
                path: path.clone(),
                size: obj.bytes.len() as u64,
                content_type: Some(obj.content_type.clone()),
                created_at: Some(obj.created_at),
            })
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn remove(&self, paths: &[String]) -> StoreResult<()> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("removal rejected".to_string()));
        }
        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_round_trips_through_public_url() {
        let storage = MemoryObjectStorage::new("https://cdn.example.org/storage/images/");
        let url = storage.public_url("campaigns/abc/photo.jpg");
        assert_eq!(url, "https://cdn.example.org/storage/images/campaigns/abc/photo.jpg");
        assert_eq!(
            storage.path_from_public_url(&url).as_deref(),
            Some("campaigns/abc/photo.jpg")
        );
        assert_eq!(storage.path_from_public_url("https://elsewhere/x.jpg"), None);
    }

    #[test]
    fn test_traversal_is_rejected() {
        assert!(checked_relative("content/../../etc/passwd").is_err());
        assert!(checked_relative("/abs.jpg").is_err());
        assert!(checked_relative("content/a.jpg").is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_upload_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/uploads");
        storage
            .upload("content/a.png", b"\x89PNG....", "image/png")
            .await
            .unwrap();

        let listed = storage.list("content").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "content/a.png");
        assert_eq!(listed[0].content_type.as_deref(), Some("image/png"));

        storage.remove(&["content/a.png".to_string()]).await.unwrap();
        assert!(storage.list("content").await.unwrap().is_empty());
        // Removing twice is not an error.
        storage.remove(&["content/a.png".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_list_is_folder_scoped() {
        let storage = MemoryObjectStorage::default();
        storage.upload("content/a.jpg", b"1", "image/jpeg").await.unwrap();
        storage.upload("campaigns/x/b.jpg", b"2", "image/jpeg").await.unwrap();
        let listed = storage.list("content").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "content/a.jpg");
    }
}
