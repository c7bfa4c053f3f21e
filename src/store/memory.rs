//! In-memory implementation of every data port.
//!
//! Used when no `DATABASE_URL` is configured and as the backend fake in tests.
//! A single write lock around all tables makes each verb atomic, which mirrors
//! the transactional guarantees of the Postgres store. Mutations append audit
//! entries the way the database triggers do.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AdminDirectory, CampaignFilter, CampaignRef, ContentStore, IdentityStore, StoreError,
    StoreResult,
};
use crate::db::models::{
    AdminUser, AuditFilter, AuditLogEntry, AuthIdentity, Campaign, CampaignChanges,
    CampaignImage, CampaignImageChanges, CampaignTranslation, CampaignTranslationInput,
    CampaignUpdate, ContentSection, ContentTranslation, NewCampaign, NewCampaignImage,
    NewCampaignUpdate, NewTestimonial, PageMetadata, PageMetadataInput, SiteSetting,
    Testimonial, TestimonialChanges,
};

const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Default)]
struct Tables {
    sections: Vec<ContentSection>,
    section_translations: Vec<ContentTranslation>,
    campaigns: Vec<Campaign>,
    campaign_translations: Vec<CampaignTranslation>,
    campaign_images: Vec<CampaignImage>,
    campaign_updates: Vec<CampaignUpdate>,
    testimonials: Vec<Testimonial>,
    page_metadata: Vec<PageMetadata>,
    settings: Vec<SiteSetting>,
    audit_log: Vec<AuditLogEntry>,
    admins: Vec<AdminUser>,
    identities: Vec<AuthIdentity>,
}

impl Tables {
    fn audit<T: Serialize>(
        &mut self,
        actor: Uuid,
        table: &str,
        record_id: Uuid,
        action: &str,
        old: Option<&T>,
        new: Option<&T>,
    ) {
        self.audit_log.push(AuditLogEntry {
            id: Uuid::new_v4(),
            table_name: table.to_string(),
            record_id: Some(record_id.to_string()),
            action: action.to_string(),
            old_values: old.and_then(|v| serde_json::to_value(v).ok()),
            new_values: new.and_then(|v| serde_json::to_value(v).ok()),
            user_id: Some(actor),
            created_at: Utc::now(),
        });
    }

    fn translation_row(campaign_id: Uuid, input: &CampaignTranslationInput) -> CampaignTranslation {
        CampaignTranslation {
            id: Uuid::new_v4(),
            campaign_id,
            language_code: input.language_code.clone(),
            title: input.title.clone(),
            story: input.story.clone(),
            full_story: input.full_story.clone(),
            child_name: input.child_name.clone(),
            child_age: input.child_age,
            location: input.location.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Clears `is_primary` on every image of `campaign_id` except `keep`.
    fn demote_primaries(&mut self, actor: Uuid, campaign_id: Uuid, keep: Option<Uuid>) {
        let mut demoted = Vec::new();
        for image in self
            .campaign_images
            .iter_mut()
            .filter(|i| i.campaign_id == campaign_id && i.is_primary && Some(i.id) != keep)
        {
            let old = image.clone();
            image.is_primary = false;
            demoted.push((old, image.clone()));
        }
        for (old, new) in demoted {
            self.audit(actor, "campaign_images", new.id, "UPDATE", Some(&old), Some(&new));
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    /// Registers a login identity and returns its id.
    pub async fn seed_identity(&self, email: &str, password_hash: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.write().await.identities.push(AuthIdentity {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        });
        id
    }

    /// Grants the admin role to an identity.
    pub async fn seed_admin(&self, identity: Uuid, role: &str, full_name: Option<&str>) {
        self.tables.write().await.admins.push(AdminUser {
            id: identity,
            role: role.to_string(),
            full_name: full_name.map(str::to_string),
            last_login: None,
        });
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn find_section(&self, key: &str) -> StoreResult<Option<ContentSection>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.sections.iter().find(|s| s.section_key == key).cloned())
    }

    async fn list_sections(&self) -> StoreResult<Vec<ContentSection>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut rows = t.sections.clone();
        rows.sort_by(|a, b| a.section_key.cmp(&b.section_key));
        Ok(rows)
    }

    async fn insert_section(
        &self,
        actor: Uuid,
        key: &str,
        content_type: &str,
    ) -> StoreResult<ContentSection> {
        self.check()?;
        let mut t = self.tables.write().await;
        if t.sections.iter().any(|s| s.section_key == key) {
            return Err(StoreError::Conflict(format!("section '{}' already exists", key)));
        }
        let now = Utc::now();
        let section = ContentSection {
            id: Uuid::new_v4(),
            section_key: key.to_string(),
            content_type: content_type.to_string(),
            created_at: now,
            updated_at: now,
        };
        t.sections.push(section.clone());
        t.audit(actor, "content_sections", section.id, "INSERT", None, Some(&section));
        Ok(section)
    }

    async fn find_section_translation(
        &self,
        section_id: Uuid,
        language: &str,
    ) -> StoreResult<Option<ContentTranslation>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.section_translations
            .iter()
            .find(|tr| tr.section_id == section_id && tr.language_code == language)
            .cloned())
    }

    async fn list_section_translations(
        &self,
        section_id: Uuid,
    ) -> StoreResult<Vec<ContentTranslation>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.section_translations
            .iter()
            .filter(|tr| tr.section_id == section_id)
            .cloned()
            .collect())
    }

    async fn upsert_section_translation(
        &self,
        actor: Uuid,
        section_id: Uuid,
        language: &str,
        content: &Value,
    ) -> StoreResult<ContentTranslation> {
        self.check()?;
        let mut t = self.tables.write().await;
        let now = Utc::now();
        if let Some(pos) = t
            .section_translations
            .iter()
            .position(|tr| tr.section_id == section_id && tr.language_code == language)
        {
            let old = t.section_translations[pos].clone();
            let row = &mut t.section_translations[pos];
            row.content = content.clone();
            row.updated_at = now;
            let new = row.clone();
            t.audit(actor, "content_translations", new.id, "UPDATE", Some(&old), Some(&new));
            return Ok(new);
        }

        let row = ContentTranslation {
            id: Uuid::new_v4(),
            section_id,
            language_code: language.to_string(),
            content: content.clone(),
            updated_at: now,
        };
        t.section_translations.push(row.clone());
        t.audit(actor, "content_translations", row.id, "INSERT", None, Some(&row));
        Ok(row)
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> StoreResult<Vec<Campaign>> {
        self.check()?;
        let t = self.tables.read().await;
        // Reverse insertion order so equal timestamps still list newest first.
        let mut rows: Vec<Campaign> = t
            .campaigns
            .iter()
            .rev()
            .filter(|c| filter.status.as_deref().is_none_or(|s| c.status == s))
            .filter(|c| filter.featured.is_none_or(|f| c.featured == f))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn find_campaign(&self, reference: &CampaignRef) -> StoreResult<Option<Campaign>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.campaigns
            .iter()
            .find(|c| match reference {
                CampaignRef::Id(id) => c.id == *id,
                CampaignRef::Slug(slug) => c.slug == *slug,
            })
            .cloned())
    }

    async fn insert_campaign(
        &self,
        actor: Uuid,
        campaign: &NewCampaign,
        translations: &[CampaignTranslationInput],
    ) -> StoreResult<Campaign> {
        self.check()?;
        let mut t = self.tables.write().await;
        if t.campaigns.iter().any(|c| c.slug == campaign.slug) {
            return Err(StoreError::Conflict(format!(
                "campaign slug '{}' already exists",
                campaign.slug
            )));
        }
        let now = Utc::now();
        let row = Campaign {
            id: Uuid::new_v4(),
            slug: campaign.slug.clone(),
            status: campaign.status.clone(),
            goal_amount: campaign.goal_amount,
            raised_amount: campaign.raised_amount,
            donor_count: campaign.donor_count,
            days_left: campaign.days_left,
            category: campaign.category.clone(),
            featured: campaign.featured,
            created_at: now,
            updated_at: now,
        };
        t.campaigns.push(row.clone());
        t.audit(actor, "campaigns", row.id, "INSERT", None, Some(&row));
        for input in translations {
            let tr = Tables::translation_row(row.id, input);
            t.campaign_translations.push(tr.clone());
            t.audit(actor, "campaign_translations", tr.id, "INSERT", None, Some(&tr));
        }
        Ok(row)
    }

    async fn update_campaign(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &CampaignChanges,
    ) -> StoreResult<Option<Campaign>> {
        self.check()?;
        let mut t = self.tables.write().await;
        if let Some(slug) = &changes.slug {
            if t.campaigns.iter().any(|c| c.slug == *slug && c.id != id) {
                return Err(StoreError::Conflict(format!(
                    "campaign slug '{}' already exists",
                    slug
                )));
            }
        }
        let Some(pos) = t.campaigns.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let old = t.campaigns[pos].clone();
        let row = &mut t.campaigns[pos];
        if let Some(v) = &changes.slug {
            row.slug = v.clone();
        }
        if let Some(v) = &changes.status {
            row.status = v.clone();
        }
        if let Some(v) = changes.goal_amount {
            row.goal_amount = v;
        }
        if let Some(v) = changes.raised_amount {
            row.raised_amount = v;
        }
        if let Some(v) = changes.donor_count {
            row.donor_count = v;
        }
        if let Some(v) = changes.days_left {
            row.days_left = v;
        }
        if let Some(v) = &changes.category {
            row.category = v.clone();
        }
        if let Some(v) = changes.featured {
            row.featured = v;
        }
        row.updated_at = Utc::now();
        let new = row.clone();
        t.audit(actor, "campaigns", id, "UPDATE", Some(&old), Some(&new));
        Ok(Some(new))
    }

    async fn delete_campaign(&self, actor: Uuid, id: Uuid) -> StoreResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.campaigns.iter().position(|c| c.id == id) else {
            return Ok(false);
        };
        let old = t.campaigns.remove(pos);
        t.campaign_translations.retain(|tr| tr.campaign_id != id);
        t.campaign_images.retain(|i| i.campaign_id != id);
        t.campaign_updates.retain(|u| u.campaign_id != id);
        t.audit(actor, "campaigns", id, "DELETE", Some(&old), None);
        Ok(true)
    }

    async fn list_campaign_translations(
        &self,
        campaign_ids: &[Uuid],
        languages: &[&str],
    ) -> StoreResult<Vec<CampaignTranslation>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.campaign_translations
            .iter()
            .filter(|tr| campaign_ids.contains(&tr.campaign_id))
            .filter(|tr| languages.contains(&tr.language_code.as_str()))
            .cloned()
            .collect())
    }

    async fn upsert_campaign_translation(
        &self,
        actor: Uuid,
        campaign_id: Uuid,
        translation: &CampaignTranslationInput,
    ) -> StoreResult<CampaignTranslation> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.campaigns.iter().any(|c| c.id == campaign_id) {
            return Err(StoreError::Conflict(format!(
                "campaign {} does not exist",
                campaign_id
            )));
        }
        if let Some(pos) = t.campaign_translations.iter().position(|tr| {
            tr.campaign_id == campaign_id && tr.language_code == translation.language_code
        }) {
            let old = t.campaign_translations[pos].clone();
            let mut new = Tables::translation_row(campaign_id, translation);
            new.id = old.id;
            t.campaign_translations[pos] = new.clone();
            t.audit(actor, "campaign_translations", new.id, "UPDATE", Some(&old), Some(&new));
            return Ok(new);
        }
        let row = Tables::translation_row(campaign_id, translation);
        t.campaign_translations.push(row.clone());
        t.audit(actor, "campaign_translations", row.id, "INSERT", None, Some(&row));
        Ok(row)
    }

    async fn list_campaign_images(&self, campaign_ids: &[Uuid]) -> StoreResult<Vec<CampaignImage>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut rows: Vec<CampaignImage> = t
            .campaign_images
            .iter()
            .filter(|i| campaign_ids.contains(&i.campaign_id))
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.display_order);
        Ok(rows)
    }

    async fn find_campaign_image(&self, id: Uuid) -> StoreResult<Option<CampaignImage>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.campaign_images.iter().find(|i| i.id == id).cloned())
    }

    async fn insert_campaign_image(
        &self,
        actor: Uuid,
        image: &NewCampaignImage,
    ) -> StoreResult<CampaignImage> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.campaigns.iter().any(|c| c.id == image.campaign_id) {
            return Err(StoreError::Conflict(format!(
                "campaign {} does not exist",
                image.campaign_id
            )));
        }
        if image.is_primary {
            t.demote_primaries(actor, image.campaign_id, None);
        }
        let display_order = t
            .campaign_images
            .iter()
            .filter(|i| i.campaign_id == image.campaign_id)
            .map(|i| i.display_order)
            .max()
            .map_or(0, |max| max + 1);
        let row = CampaignImage {
            id: Uuid::new_v4(),
            campaign_id: image.campaign_id,
            image_url: image.image_url.clone(),
            image_alt: image.image_alt.clone(),
            is_primary: image.is_primary,
            display_order,
            created_at: Utc::now(),
        };
        t.campaign_images.push(row.clone());
        t.audit(actor, "campaign_images", row.id, "INSERT", None, Some(&row));
        Ok(row)
    }

    async fn update_campaign_image(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &CampaignImageChanges,
    ) -> StoreResult<Option<CampaignImage>> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.campaign_images.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        let campaign_id = t.campaign_images[pos].campaign_id;
        if changes.is_primary == Some(true) {
            t.demote_primaries(actor, campaign_id, Some(id));
        }
        let old = t.campaign_images[pos].clone();
        let row = &mut t.campaign_images[pos];
        if let Some(alt) = &changes.image_alt {
            row.image_alt = alt.clone();
        }
        if let Some(primary) = changes.is_primary {
            row.is_primary = primary;
        }
        if let Some(order) = changes.display_order {
            row.display_order = order;
        }
        let new = row.clone();
        t.audit(actor, "campaign_images", id, "UPDATE", Some(&old), Some(&new));
        Ok(Some(new))
    }

    async fn delete_campaign_image(
        &self,
        actor: Uuid,
        id: Uuid,
    ) -> StoreResult<Option<CampaignImage>> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.campaign_images.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        let old = t.campaign_images.remove(pos);
        t.audit(actor, "campaign_images", id, "DELETE", Some(&old), None);
        Ok(Some(old))
    }

    async fn list_campaign_updates(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignUpdate>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut rows: Vec<CampaignUpdate> = t
            .campaign_updates
            .iter()
            .rev()
            .filter(|u| u.campaign_id == campaign_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.update_date
                .cmp(&a.update_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn insert_campaign_update(
        &self,
        actor: Uuid,
        update: &NewCampaignUpdate,
    ) -> StoreResult<CampaignUpdate> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.campaigns.iter().any(|c| c.id == update.campaign_id) {
            return Err(StoreError::Conflict(format!(
                "campaign {} does not exist",
                update.campaign_id
            )));
        }
        let row = CampaignUpdate {
            id: Uuid::new_v4(),
            campaign_id: update.campaign_id,
            update_date: update.update_date,
            content: update.content.clone(),
            created_at: Utc::now(),
            created_by: Some(actor),
        };
        t.campaign_updates.push(row.clone());
        t.audit(actor, "campaign_updates", row.id, "INSERT", None, Some(&row));
        Ok(row)
    }

    async fn delete_campaign_update(&self, actor: Uuid, id: Uuid) -> StoreResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.campaign_updates.iter().position(|u| u.id == id) else {
            return Ok(false);
        };
        let old = t.campaign_updates.remove(pos);
        t.audit(actor, "campaign_updates", id, "DELETE", Some(&old), None);
        Ok(true)
    }

    async fn list_testimonials(&self, active_only: bool) -> StoreResult<Vec<Testimonial>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut rows: Vec<Testimonial> = t
            .testimonials
            .iter()
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.display_order);
        Ok(rows)
    }

    async fn insert_testimonial(
        &self,
        actor: Uuid,
        testimonial: &NewTestimonial,
    ) -> StoreResult<Testimonial> {
        self.check()?;
        let mut t = self.tables.write().await;
        let display_order = t
            .testimonials
            .iter()
            .map(|r| r.display_order)
            .max()
            .map_or(0, |max| max + 1);
        let now = Utc::now();
        let row = Testimonial {
            id: Uuid::new_v4(),
            name: testimonial.name.clone(),
            role: testimonial.role.clone(),
            content: testimonial.content.clone(),
            avatar_initials: testimonial.avatar_initials.clone(),
            display_order,
            is_active: testimonial.is_active,
            created_at: now,
            updated_at: now,
        };
        t.testimonials.push(row.clone());
        t.audit(actor, "testimonials", row.id, "INSERT", None, Some(&row));
        Ok(row)
    }

    async fn update_testimonial(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &TestimonialChanges,
    ) -> StoreResult<Option<Testimonial>> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.testimonials.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let old = t.testimonials[pos].clone();
        let row = &mut t.testimonials[pos];
        if let Some(v) = &changes.name {
            row.name = v.clone();
        }
        if let Some(v) = &changes.role {
            row.role = v.clone();
        }
        if let Some(v) = &changes.content {
            row.content = v.clone();
        }
        if let Some(v) = &changes.avatar_initials {
            row.avatar_initials = v.clone();
        }
        if let Some(v) = changes.is_active {
            row.is_active = v;
        }
        row.updated_at = Utc::now();
        let new = row.clone();
        t.audit(actor, "testimonials", id, "UPDATE", Some(&old), Some(&new));
        Ok(Some(new))
    }

    async fn delete_testimonial(&self, actor: Uuid, id: Uuid) -> StoreResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.testimonials.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let old = t.testimonials.remove(pos);
        t.audit(actor, "testimonials", id, "DELETE", Some(&old), None);
        Ok(true)
    }

    async fn set_testimonial_order(
        &self,
        actor: Uuid,
        id: Uuid,
        display_order: i32,
    ) -> StoreResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.testimonials.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let old = t.testimonials[pos].clone();
        let row = &mut t.testimonials[pos];
        row.display_order = display_order;
        row.updated_at = Utc::now();
        let new = row.clone();
        t.audit(actor, "testimonials", id, "UPDATE", Some(&old), Some(&new));
        Ok(true)
    }

    async fn find_page_metadata(
        &self,
        page_path: &str,
        language: &str,
    ) -> StoreResult<Option<PageMetadata>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.page_metadata
            .iter()
            .find(|m| m.page_path == page_path && m.language_code == language)
            .cloned())
    }

    async fn list_page_metadata(&self) -> StoreResult<Vec<PageMetadata>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut rows = t.page_metadata.clone();
        rows.sort_by(|a, b| {
            a.page_path
                .cmp(&b.page_path)
                .then(a.language_code.cmp(&b.language_code))
        });
        Ok(rows)
    }

    async fn upsert_page_metadata(
        &self,
        actor: Uuid,
        input: &PageMetadataInput,
    ) -> StoreResult<PageMetadata> {
        self.check()?;
        let mut t = self.tables.write().await;
        let existing = t
            .page_metadata
            .iter()
            .position(|m| m.page_path == input.page_path && m.language_code == input.language_code);
        let row = PageMetadata {
            id: existing.map_or_else(Uuid::new_v4, |pos| t.page_metadata[pos].id),
            page_path: input.page_path.clone(),
            language_code: input.language_code.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            keywords: input.keywords.clone(),
            og_title: input.og_title.clone(),
            og_description: input.og_description.clone(),
            og_image: input.og_image.clone(),
            twitter_card: input.twitter_card.clone(),
            twitter_title: input.twitter_title.clone(),
            twitter_description: input.twitter_description.clone(),
            twitter_image: input.twitter_image.clone(),
            updated_at: Utc::now(),
        };
        match existing {
            Some(pos) => {
                let old = std::mem::replace(&mut t.page_metadata[pos], row.clone());
                t.audit(actor, "page_metadata", row.id, "UPDATE", Some(&old), Some(&row));
            }
            None => {
                t.page_metadata.push(row.clone());
                t.audit(actor, "page_metadata", row.id, "INSERT", None, Some(&row));
            }
        }
        Ok(row)
    }

    async fn delete_page_metadata(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<PageMetadata>> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(pos) = t.page_metadata.iter().position(|m| m.id == id) else {
            return Ok(None);
        };
        let old = t.page_metadata.remove(pos);
        t.audit(actor, "page_metadata", id, "DELETE", Some(&old), None);
        Ok(Some(old))
    }

    async fn find_setting(&self, key: &str) -> StoreResult<Option<SiteSetting>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.settings.iter().find(|s| s.setting_key == key).cloned())
    }

    async fn list_settings(&self) -> StoreResult<Vec<SiteSetting>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut rows = t.settings.clone();
        rows.sort_by(|a, b| a.setting_key.cmp(&b.setting_key));
        Ok(rows)
    }

    async fn upsert_setting(
        &self,
        actor: Uuid,
        key: &str,
        value: &Value,
        description: Option<&str>,
    ) -> StoreResult<SiteSetting> {
        self.check()?;
        let mut t = self.tables.write().await;
        let now = Utc::now();
        if let Some(pos) = t.settings.iter().position(|s| s.setting_key == key) {
            let old = t.settings[pos].clone();
            let row = &mut t.settings[pos];
            row.setting_value = value.clone();
            if let Some(d) = description {
                row.description = Some(d.to_string());
            }
            row.updated_at = now;
            let new = row.clone();
            t.audit(actor, "site_settings", new.id, "UPDATE", Some(&old), Some(&new));
            return Ok(new);
        }
        let row = SiteSetting {
            id: Uuid::new_v4(),
            setting_key: key.to_string(),
            setting_value: value.clone(),
            description: description.map(str::to_string),
            updated_at: now,
        };
        t.settings.push(row.clone());
        t.audit(actor, "site_settings", row.id, "INSERT", None, Some(&row));
        Ok(row)
    }

    async fn list_audit_log(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditLogEntry>> {
        self.check()?;
        let t = self.tables.read().await;
        let limit = filter.limit.unwrap_or(100).clamp(1, MAX_AUDIT_LIMIT) as usize;
        Ok(t.audit_log
            .iter()
            .rev()
            .filter(|e| filter.table_name.as_deref().is_none_or(|n| e.table_name == n))
            .filter(|e| filter.user_id.is_none_or(|u| e.user_id == Some(u)))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AdminDirectory for MemoryStore {
    async fn find_admin(&self, identity: Uuid) -> StoreResult<Option<AdminUser>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.admins.iter().find(|a| a.id == identity).cloned())
    }

    async fn record_login(&self, identity: Uuid) -> StoreResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        if let Some(admin) = t.admins.iter_mut().find(|a| a.id == identity) {
            admin.last_login = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<AuthIdentity>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.identities
            .iter()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_campaign(slug: &str) -> NewCampaign {
        NewCampaign {
            slug: slug.to_string(),
            status: "active".to_string(),
            goal_amount: 1000,
            raised_amount: 0,
            donor_count: 0,
            days_left: None,
            category: None,
            featured: false,
        }
    }

    fn image(campaign_id: Uuid, url: &str, is_primary: bool) -> NewCampaignImage {
        NewCampaignImage {
            campaign_id,
            image_url: url.to_string(),
            image_alt: None,
            is_primary,
        }
    }

    #[tokio::test]
    async fn test_images_append_and_keep_single_primary() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let campaign = store.insert_campaign(actor, &new_campaign("a"), &[]).await.unwrap();

        let first = store
            .insert_campaign_image(actor, &image(campaign.id, "/1.jpg", true))
            .await
            .unwrap();
        let second = store
            .insert_campaign_image(actor, &image(campaign.id, "/2.jpg", true))
            .await
            .unwrap();
        assert_eq!(first.display_order, 0);
        assert_eq!(second.display_order, 1);

        let images = store.list_campaign_images(&[campaign.id]).await.unwrap();
        let primaries: Vec<_> = images.iter().filter(|i| i.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, second.id);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        store.insert_campaign(actor, &new_campaign("dup"), &[]).await.unwrap();
        let err = store
            .insert_campaign(actor, &new_campaign("dup"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failing_switch() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable)));
        store.set_failing(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_mutations_are_audited() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        store.insert_campaign(actor, &new_campaign("audited"), &[]).await.unwrap();
        let entries = store
            .list_audit_log(&AuditFilter {
                table_name: Some("campaigns".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "INSERT");
        assert_eq!(entries[0].user_id, Some(actor));
    }
}
