//! Data ports.
//!
//! The data-access layer (`crate::cms`) never talks to a backend directly; it is
//! handed implementations of these traits. `ContentStore` is the request-scoped
//! port, `AdminDirectory` the privileged one used only for role lookups, and
//! `ObjectStorage` the blob store behind the media library.
//!
//! Multi-row invariants (single primary image, append-at-end ordering, campaign
//! + translations creation) are enforced atomically *inside* the port
//! implementations, so callers cannot observe a half-applied write.

pub mod memory;
pub mod object;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::db::models::{
    AdminUser, AuditFilter, AuditLogEntry, AuthIdentity, Campaign, CampaignChanges,
    CampaignImage, CampaignImageChanges, CampaignTranslation, CampaignTranslationInput,
    CampaignUpdate, ContentSection, ContentTranslation, NewCampaign, NewCampaignImage,
    NewCampaignUpdate, NewTestimonial, PageMetadata, PageMetadataInput, SiteSetting,
    Testimonial, TestimonialChanges,
};

pub use memory::MemoryStore;
pub use object::{LocalObjectStorage, MemoryObjectStorage};
pub use postgres::{PgAdminDirectory, PgStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend unavailable")]
    Unavailable,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a single campaign is addressed: by primary key or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignRef {
    Id(Uuid),
    Slug(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub status: Option<String>,
    pub featured: Option<bool>,
    pub limit: Option<i64>,
}

/// Request-scoped data port over the site's tables.
///
/// List operations return rows in their display order: campaigns newest
/// first, images and testimonials by `display_order`, updates newest
/// `update_date` first. Every mutating verb takes the acting admin's id so the
/// audit trail can attribute the change.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // Sections
    async fn find_section(&self, key: &str) -> StoreResult<Option<ContentSection>>;
    async fn list_sections(&self) -> StoreResult<Vec<ContentSection>>;
    async fn insert_section(
        &self,
        actor: Uuid,
        key: &str,
        content_type: &str,
    ) -> StoreResult<ContentSection>;
    async fn find_section_translation(
        &self,
        section_id: Uuid,
        language: &str,
    ) -> StoreResult<Option<ContentTranslation>>;
    async fn list_section_translations(
        &self,
        section_id: Uuid,
    ) -> StoreResult<Vec<ContentTranslation>>;
    /// Replaces the whole document for `(section_id, language)`.
    async fn upsert_section_translation(
        &self,
        actor: Uuid,
        section_id: Uuid,
        language: &str,
        content: &Value,
    ) -> StoreResult<ContentTranslation>;

    // Campaigns
    async fn list_campaigns(&self, filter: &CampaignFilter) -> StoreResult<Vec<Campaign>>;
    async fn find_campaign(&self, reference: &CampaignRef) -> StoreResult<Option<Campaign>>;
    /// Inserts the campaign and its translations in one transaction.
    async fn insert_campaign(
        &self,
        actor: Uuid,
        campaign: &NewCampaign,
        translations: &[CampaignTranslationInput],
    ) -> StoreResult<Campaign>;
    async fn update_campaign(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &CampaignChanges,
    ) -> StoreResult<Option<Campaign>>;
    /// Deletes the campaign; translations, images and updates cascade.
    async fn delete_campaign(&self, actor: Uuid, id: Uuid) -> StoreResult<bool>;

    /// Translations of the given campaigns restricted to `languages`.
    async fn list_campaign_translations(
        &self,
        campaign_ids: &[Uuid],
        languages: &[&str],
    ) -> StoreResult<Vec<CampaignTranslation>>;
    async fn upsert_campaign_translation(
        &self,
        actor: Uuid,
        campaign_id: Uuid,
        translation: &CampaignTranslationInput,
    ) -> StoreResult<CampaignTranslation>;

    async fn list_campaign_images(&self, campaign_ids: &[Uuid]) -> StoreResult<Vec<CampaignImage>>;
    async fn find_campaign_image(&self, id: Uuid) -> StoreResult<Option<CampaignImage>>;
    /// Appends at `max(display_order) + 1` (0 when empty); when the new image is
    /// primary, every other image of the campaign is demoted in the same
    /// transaction.
    async fn insert_campaign_image(
        &self,
        actor: Uuid,
        image: &NewCampaignImage,
    ) -> StoreResult<CampaignImage>;
    /// Setting `is_primary` demotes the campaign's other images atomically.
    async fn update_campaign_image(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &CampaignImageChanges,
    ) -> StoreResult<Option<CampaignImage>>;
    async fn delete_campaign_image(
        &self,
        actor: Uuid,
        id: Uuid,
    ) -> StoreResult<Option<CampaignImage>>;

    async fn list_campaign_updates(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignUpdate>>;
    async fn insert_campaign_update(
        &self,
        actor: Uuid,
        update: &NewCampaignUpdate,
    ) -> StoreResult<CampaignUpdate>;
    async fn delete_campaign_update(&self, actor: Uuid, id: Uuid) -> StoreResult<bool>;

    // Testimonials
    async fn list_testimonials(&self, active_only: bool) -> StoreResult<Vec<Testimonial>>;
    /// Appends at `max(display_order) + 1`.
    async fn insert_testimonial(
        &self,
        actor: Uuid,
        testimonial: &NewTestimonial,
    ) -> StoreResult<Testimonial>;
    async fn update_testimonial(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &TestimonialChanges,
    ) -> StoreResult<Option<Testimonial>>;
    async fn delete_testimonial(&self, actor: Uuid, id: Uuid) -> StoreResult<bool>;
    async fn set_testimonial_order(
        &self,
        actor: Uuid,
        id: Uuid,
        display_order: i32,
    ) -> StoreResult<bool>;

    // Page metadata
    async fn find_page_metadata(
        &self,
        page_path: &str,
        language: &str,
    ) -> StoreResult<Option<PageMetadata>>;
    async fn list_page_metadata(&self) -> StoreResult<Vec<PageMetadata>>;
    async fn upsert_page_metadata(
        &self,
        actor: Uuid,
        input: &PageMetadataInput,
    ) -> StoreResult<PageMetadata>;
    /// The deleted row, or `None` when no row had that id.
    async fn delete_page_metadata(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<PageMetadata>>;

    // Settings
    async fn find_setting(&self, key: &str) -> StoreResult<Option<SiteSetting>>;
    async fn list_settings(&self) -> StoreResult<Vec<SiteSetting>>;
    async fn upsert_setting(
        &self,
        actor: Uuid,
        key: &str,
        value: &Value,
        description: Option<&str>,
    ) -> StoreResult<SiteSetting>;

    // Audit (read-only; rows are written by the backend)
    async fn list_audit_log(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditLogEntry>>;
}

/// Privileged port: role lookups that bypass the caller's own row restrictions.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn find_admin(&self, identity: Uuid) -> StoreResult<Option<AdminUser>>;
    async fn record_login(&self, identity: Uuid) -> StoreResult<()>;
}

/// Credential lookup for the login endpoint.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<AuthIdentity>>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredObject {
    /// Path inside the bucket, e.g. `campaigns/<id>/<file>`.
    pub path: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Blob storage for the `images` bucket.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> StoreResult<()>;
    /// Objects directly under `prefix` (no recursion).
    async fn list(&self, prefix: &str) -> StoreResult<Vec<StoredObject>>;
    async fn remove(&self, paths: &[String]) -> StoreResult<()>;
    fn public_url(&self, path: &str) -> String;

    /// Inverse of [`ObjectStorage::public_url`]; `None` for foreign URLs.
    fn path_from_public_url(&self, url: &str) -> Option<String> {
        let base = self.public_url("");
        url.strip_prefix(base.as_str())
            .map(|p| p.trim_start_matches('/').to_string())
            .filter(|p| !p.is_empty())
    }
}
