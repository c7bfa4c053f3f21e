//! Media library over the `images` bucket.
//!
//! Uploads are scoped to `content` or `campaigns/<uuid>`. Files are validated
//! (declared type, size, magic bytes) before anything touches storage.

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ActionError, ActionResult, Caller, Cms};

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Where in the bucket a file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Content,
    Campaign(Uuid),
}

impl MediaFolder {
    pub fn parse(folder: &str) -> ActionResult<Self> {
        let folder = folder.trim_matches('/');
        if folder == "content" {
            return Ok(MediaFolder::Content);
        }
        folder
            .strip_prefix("campaigns/")
            .and_then(|id| Uuid::parse_str(id).ok())
            .map(MediaFolder::Campaign)
            .ok_or_else(|| {
                ActionError::validation("Folder must be 'content' or 'campaigns/<campaign id>'")
            })
    }

    pub fn prefix(&self) -> String {
        match self {
            MediaFolder::Content => "content".to_string(),
            MediaFolder::Campaign(id) => format!("campaigns/{}", id),
        }
    }

    /// True when `path` is a file directly inside this folder.
    fn contains(&self, path: &str) -> bool {
        path.strip_prefix(&self.prefix())
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|name| !name.is_empty() && is_safe_filename(name))
    }
}

fn is_safe_filename(name: &str) -> bool {
    !name.contains("..") && !name.contains('/') && !name.contains('\\') && !name.contains('\0')
}

fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Checks declared type, size and content. Returns the file extension.
pub fn validate_upload(content_type: &str, bytes: &[u8]) -> ActionResult<&'static str> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ActionError::validation(
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.",
        ));
    }
    if bytes.is_empty() {
        return Err(ActionError::validation("File is empty"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ActionError::validation("File too large. Maximum size is 5MB."));
    }
    match detect_image_type(bytes) {
        Some(detected) if detected == content_type => Ok(extension_for(detected)),
        _ => Err(ActionError::validation(
            "File content does not match its declared type",
        )),
    }
}

fn generated_name(extension: &str) -> String {
    format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        Alphanumeric
            .sample_string(&mut rand::rng(), 8)
            .to_ascii_lowercase(),
        extension
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: String,
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Cms {
    pub async fn upload_media(
        &self,
        caller: &Caller,
        folder: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> ActionResult<MediaItem> {
        let folder = MediaFolder::parse(folder)?;
        let extension = validate_upload(content_type, bytes)?;
        self.require_admin(caller).await?;

        let name = generated_name(extension);
        let path = format!("{}/{}", folder.prefix(), name);
        let content_type = content_type.trim().to_ascii_lowercase();
        self.storage
            .upload(&path, bytes, &content_type)
            .await
            .map_err(|e| {
                tracing::error!(path = %path, error = %e, "upload failed");
                ActionError::Backend("Failed to store file".to_string())
            })?;

        tracing::info!(path = %path, size = bytes.len(), "media uploaded");
        Ok(MediaItem {
            url: self.storage.public_url(&path),
            name,
            path,
            size: bytes.len() as u64,
            content_type: Some(content_type),
            created_at: Some(Utc::now()),
        })
    }

    pub async fn list_media(&self, caller: &Caller, folder: &str) -> Vec<MediaItem> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        let Ok(folder) = MediaFolder::parse(folder) else {
            return Vec::new();
        };
        match self.storage.list(&folder.prefix()).await {
            Ok(objects) => objects
                .into_iter()
                .map(|o| MediaItem {
                    name: o.path.rsplit('/').next().unwrap_or_default().to_string(),
                    url: self.storage.public_url(&o.path),
                    path: o.path,
                    size: o.size,
                    content_type: o.content_type,
                    created_at: o.created_at,
                })
                .collect(),
            Err(e) => {
                tracing::error!(folder = %folder.prefix(), error = %e, "failed to list media");
                Vec::new()
            }
        }
    }

    /// Removes files by bucket path; every path must lie in a managed folder.
    pub async fn delete_media(&self, caller: &Caller, paths: &[String]) -> ActionResult<()> {
        self.require_admin(caller).await?;
        if paths.is_empty() {
            return Err(ActionError::validation("No files selected"));
        }
        for path in paths {
            let folder = path
                .rsplit_once('/')
                .and_then(|(dir, _)| MediaFolder::parse(dir).ok());
            if !folder.is_some_and(|f| f.contains(path)) {
                return Err(ActionError::validation(format!("Invalid media path '{}'", path)));
            }
        }

        self.storage.remove(paths).await.map_err(|e| {
            tracing::error!(error = %e, "media removal failed");
            ActionError::Backend("Failed to delete files".to_string())
        })?;
        tracing::info!(count = paths.len(), "media deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::testing::fixture;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn test_pdf_is_rejected() {
        let err = validate_upload("application/pdf", b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn test_oversized_jpeg_is_rejected() {
        let mut big = vec![0u8; 6 * 1024 * 1024];
        big[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        let err = validate_upload("image/jpeg", &big).unwrap_err();
        assert_eq!(
            err,
            ActionError::Validation("File too large. Maximum size is 5MB.".to_string())
        );
    }

    #[test]
    fn test_mismatched_magic_bytes_are_rejected() {
        assert!(validate_upload("image/png", JPEG).is_err());
        assert_eq!(validate_upload("image/jpeg", JPEG).unwrap(), "jpg");
    }

    #[test]
    fn test_folder_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(MediaFolder::parse("content").unwrap(), MediaFolder::Content);
        assert_eq!(
            MediaFolder::parse(&format!("campaigns/{}", id)).unwrap(),
            MediaFolder::Campaign(id)
        );
        assert!(MediaFolder::parse("campaigns/not-a-uuid").is_err());
        assert!(MediaFolder::parse("../etc").is_err());
    }

    #[tokio::test]
    async fn test_rejected_upload_never_reaches_storage_or_gate() {
        let fx = fixture().await;
        // The store is down, so any gate lookup would fail as Unauthorized.
        fx.store.set_failing(true);
        let err = fx
            .cms
            .upload_media(&fx.admin, "content", "application/pdf", b"%PDF")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_list_delete() {
        let fx = fixture().await;
        let item = fx
            .cms
            .upload_media(&fx.admin, "content", "image/jpeg", JPEG)
            .await
            .unwrap();
        assert!(item.path.starts_with("content/"));
        assert!(item.path.ends_with(".jpg"));
        assert_eq!(item.url, format!("/uploads/{}", item.path));

        let listed = fx.cms.list_media(&fx.admin, "content").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, item.name);

        fx.cms
            .delete_media(&fx.admin, &[item.path.clone()])
            .await
            .unwrap();
        assert!(fx.cms.list_media(&fx.admin, "content").await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_outside_managed_folders_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .cms
            .delete_media(&fx.admin, &["secrets/key.pem".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
        let err = fx
            .cms
            .delete_media(&fx.admin, &["content/../x.jpg".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_visitor_cannot_upload() {
        let fx = fixture().await;
        let err = fx
            .cms
            .upload_media(&fx.visitor, "content", "image/jpeg", JPEG)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
        assert!(fx.cms.list_media(&fx.admin, "content").await.is_empty());
    }
}
