//! Postgres implementation of the data ports.
//!
//! Every write runs in a transaction that first publishes the acting admin as
//! `app.current_user_id`, which the `record_audit()` trigger reads.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
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

const SECTION_COLUMNS: &str = "id, section_key, content_type, created_at, updated_at";
const SECTION_TRANSLATION_COLUMNS: &str = "id, section_id, language_code, content, updated_at";
const CAMPAIGN_COLUMNS: &str = "id, slug, status, goal_amount, raised_amount, donor_count, \
     days_left, category, featured, created_at, updated_at";
const CAMPAIGN_TRANSLATION_COLUMNS: &str = "id, campaign_id, language_code, title, story, \
     full_story, child_name, child_age, location, updated_at";
const IMAGE_COLUMNS: &str =
    "id, campaign_id, image_url, image_alt, is_primary, display_order, created_at";
const UPDATE_COLUMNS: &str = "id, campaign_id, update_date, content, created_at, created_by";
const TESTIMONIAL_COLUMNS: &str = "id, name, role, content, avatar_initials, display_order, \
     is_active, created_at, updated_at";
const METADATA_COLUMNS: &str = "id, page_path, language_code, title, description, keywords, \
     og_title, og_description, og_image, twitter_card, twitter_title, twitter_description, \
     twitter_image, updated_at";
const SETTING_COLUMNS: &str = "id, setting_key, setting_value, description, updated_at";
const AUDIT_COLUMNS: &str =
    "id, table_name, record_id, action, old_values, new_values, user_id, created_at";

const MAX_AUDIT_LIMIT: i64 = 500;

/// Maps unique-constraint violations to [`StoreError::Conflict`].
fn conflict_or(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{} already exists", what))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::Conflict(format!("{} references a missing record", what))
        }
        _ => StoreError::Database(e),
    }
}

/// Request-scoped store over the site's tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin_as(&self, actor: Uuid) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
            .bind(actor.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_section(&self, key: &str) -> StoreResult<Option<ContentSection>> {
        let sql = format!("SELECT {SECTION_COLUMNS} FROM content_sections WHERE section_key = $1");
        Ok(sqlx::query_as::<_, ContentSection>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_sections(&self) -> StoreResult<Vec<ContentSection>> {
        let sql = format!("SELECT {SECTION_COLUMNS} FROM content_sections ORDER BY section_key");
        Ok(sqlx::query_as::<_, ContentSection>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_section(
        &self,
        actor: Uuid,
        key: &str,
        content_type: &str,
    ) -> StoreResult<ContentSection> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            "INSERT INTO content_sections (section_key, content_type) VALUES ($1, $2) \
             RETURNING {SECTION_COLUMNS}"
        );
        let section = sqlx::query_as::<_, ContentSection>(&sql)
            .bind(key)
            .bind(content_type)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "section"))?;
        tx.commit().await?;
        Ok(section)
    }

    async fn find_section_translation(
        &self,
        section_id: Uuid,
        language: &str,
    ) -> StoreResult<Option<ContentTranslation>> {
        let sql = format!(
            "SELECT {SECTION_TRANSLATION_COLUMNS} FROM content_translations \
             WHERE section_id = $1 AND language_code = $2"
        );
        Ok(sqlx::query_as::<_, ContentTranslation>(&sql)
            .bind(section_id)
            .bind(language)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_section_translations(
        &self,
        section_id: Uuid,
    ) -> StoreResult<Vec<ContentTranslation>> {
        let sql = format!(
            "SELECT {SECTION_TRANSLATION_COLUMNS} FROM content_translations \
             WHERE section_id = $1 ORDER BY language_code"
        );
        Ok(sqlx::query_as::<_, ContentTranslation>(&sql)
            .bind(section_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_section_translation(
        &self,
        actor: Uuid,
        section_id: Uuid,
        language: &str,
        content: &Value,
    ) -> StoreResult<ContentTranslation> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            r#"
            INSERT INTO content_translations (section_id, language_code, content, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (section_id, language_code) DO UPDATE SET
                content = EXCLUDED.content,
                updated_at = now()
            RETURNING {SECTION_TRANSLATION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ContentTranslation>(&sql)
            .bind(section_id)
            .bind(language)
            .bind(content)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "section translation"))?;
        sqlx::query("UPDATE content_sections SET updated_at = now() WHERE id = $1")
            .bind(section_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> StoreResult<Vec<Campaign>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE TRUE"));
        if let Some(status) = &filter.status {
            qb.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(featured) = filter.featured {
            qb.push(" AND featured = ").push_bind(featured);
        }
        qb.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }
        Ok(qb
            .build_query_as::<Campaign>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_campaign(&self, reference: &CampaignRef) -> StoreResult<Option<Campaign>> {
        let row = match reference {
            CampaignRef::Id(id) => {
                let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1");
                sqlx::query_as::<_, Campaign>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            CampaignRef::Slug(slug) => {
                let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE slug = $1");
                sqlx::query_as::<_, Campaign>(&sql)
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(row)
    }

    async fn insert_campaign(
        &self,
        actor: Uuid,
        campaign: &NewCampaign,
        translations: &[CampaignTranslationInput],
    ) -> StoreResult<Campaign> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            r#"
            INSERT INTO campaigns
                (slug, status, goal_amount, raised_amount, donor_count, days_left, category, featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Campaign>(&sql)
            .bind(&campaign.slug)
            .bind(&campaign.status)
            .bind(campaign.goal_amount)
            .bind(campaign.raised_amount)
            .bind(campaign.donor_count)
            .bind(campaign.days_left)
            .bind(&campaign.category)
            .bind(campaign.featured)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "campaign slug"))?;

        for translation in translations {
            sqlx::query(
                r#"
                INSERT INTO campaign_translations
                    (campaign_id, language_code, title, story, full_story, child_name, child_age, location)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(row.id)
            .bind(&translation.language_code)
            .bind(&translation.title)
            .bind(&translation.story)
            .bind(&translation.full_story)
            .bind(&translation.child_name)
            .bind(translation.child_age)
            .bind(&translation.location)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "campaign translation"))?;
        }

        // Dropping the transaction on any error above rolls the parent back too.
        tx.commit().await?;
        Ok(row)
    }

    async fn update_campaign(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &CampaignChanges,
    ) -> StoreResult<Option<Campaign>> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 FOR UPDATE");
        let Some(existing) = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE campaigns
            SET slug = $1, status = $2, goal_amount = $3, raised_amount = $4, donor_count = $5,
                days_left = $6, category = $7, featured = $8, updated_at = now()
            WHERE id = $9
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Campaign>(&sql)
            .bind(changes.slug.as_ref().unwrap_or(&existing.slug))
            .bind(changes.status.as_ref().unwrap_or(&existing.status))
            .bind(changes.goal_amount.unwrap_or(existing.goal_amount))
            .bind(changes.raised_amount.unwrap_or(existing.raised_amount))
            .bind(changes.donor_count.unwrap_or(existing.donor_count))
            .bind(changes.days_left.unwrap_or(existing.days_left))
            .bind(changes.category.clone().unwrap_or(existing.category))
            .bind(changes.featured.unwrap_or(existing.featured))
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "campaign slug"))?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete_campaign(&self, actor: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.begin_as(actor).await?;
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_campaign_translations(
        &self,
        campaign_ids: &[Uuid],
        languages: &[&str],
    ) -> StoreResult<Vec<CampaignTranslation>> {
        if campaign_ids.is_empty() {
            return Ok(Vec::new());
        }
        let languages: Vec<String> = languages.iter().map(|l| l.to_string()).collect();
        let sql = format!(
            "SELECT {CAMPAIGN_TRANSLATION_COLUMNS} FROM campaign_translations \
             WHERE campaign_id = ANY($1) AND language_code = ANY($2)"
        );
        Ok(sqlx::query_as::<_, CampaignTranslation>(&sql)
            .bind(campaign_ids)
            .bind(&languages)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_campaign_translation(
        &self,
        actor: Uuid,
        campaign_id: Uuid,
        translation: &CampaignTranslationInput,
    ) -> StoreResult<CampaignTranslation> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            r#"
            INSERT INTO campaign_translations
                (campaign_id, language_code, title, story, full_story, child_name, child_age, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (campaign_id, language_code) DO UPDATE SET
                title = EXCLUDED.title,
                story = EXCLUDED.story,
                full_story = EXCLUDED.full_story,
                child_name = EXCLUDED.child_name,
                child_age = EXCLUDED.child_age,
                location = EXCLUDED.location,
                updated_at = now()
            RETURNING {CAMPAIGN_TRANSLATION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CampaignTranslation>(&sql)
            .bind(campaign_id)
            .bind(&translation.language_code)
            .bind(&translation.title)
            .bind(&translation.story)
            .bind(&translation.full_story)
            .bind(&translation.child_name)
            .bind(translation.child_age)
            .bind(&translation.location)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "campaign translation"))?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_campaign_images(&self, campaign_ids: &[Uuid]) -> StoreResult<Vec<CampaignImage>> {
        if campaign_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM campaign_images WHERE campaign_id = ANY($1) \
             ORDER BY display_order ASC, created_at ASC"
        );
        Ok(sqlx::query_as::<_, CampaignImage>(&sql)
            .bind(campaign_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_campaign_image(&self, id: Uuid) -> StoreResult<Option<CampaignImage>> {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM campaign_images WHERE id = $1");
        Ok(sqlx::query_as::<_, CampaignImage>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_campaign_image(
        &self,
        actor: Uuid,
        image: &NewCampaignImage,
    ) -> StoreResult<CampaignImage> {
        let mut tx = self.begin_as(actor).await?;

        // Row lock on the parent serialises concurrent image writes per campaign.
        let parent: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
                .bind(image.campaign_id)
                .fetch_optional(&mut *tx)
                .await?;
        if parent.is_none() {
            return Err(StoreError::Conflict(format!(
                "campaign {} does not exist",
                image.campaign_id
            )));
        }

        if image.is_primary {
            sqlx::query(
                "UPDATE campaign_images SET is_primary = false \
                 WHERE campaign_id = $1 AND is_primary",
            )
            .bind(image.campaign_id)
            .execute(&mut *tx)
            .await?;
        }

        let (next_order,): (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(display_order) + 1, 0) FROM campaign_images WHERE campaign_id = $1",
        )
        .bind(image.campaign_id)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            r#"
            INSERT INTO campaign_images (campaign_id, image_url, image_alt, is_primary, display_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {IMAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CampaignImage>(&sql)
            .bind(image.campaign_id)
            .bind(&image.image_url)
            .bind(&image.image_alt)
            .bind(image.is_primary)
            .bind(next_order)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_campaign_image(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &CampaignImageChanges,
    ) -> StoreResult<Option<CampaignImage>> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM campaign_images WHERE id = $1 FOR UPDATE");
        let Some(existing) = sqlx::query_as::<_, CampaignImage>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if changes.is_primary == Some(true) {
            sqlx::query(
                "UPDATE campaign_images SET is_primary = false \
                 WHERE campaign_id = $1 AND id <> $2 AND is_primary",
            )
            .bind(existing.campaign_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            r#"
            UPDATE campaign_images
            SET image_alt = $1, is_primary = $2, display_order = $3
            WHERE id = $4
            RETURNING {IMAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CampaignImage>(&sql)
            .bind(changes.image_alt.clone().unwrap_or(existing.image_alt))
            .bind(changes.is_primary.unwrap_or(existing.is_primary))
            .bind(changes.display_order.unwrap_or(existing.display_order))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete_campaign_image(
        &self,
        actor: Uuid,
        id: Uuid,
    ) -> StoreResult<Option<CampaignImage>> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!("DELETE FROM campaign_images WHERE id = $1 RETURNING {IMAGE_COLUMNS}");
        let row = sqlx::query_as::<_, CampaignImage>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_campaign_updates(&self, campaign_id: Uuid) -> StoreResult<Vec<CampaignUpdate>> {
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM campaign_updates WHERE campaign_id = $1 \
             ORDER BY update_date DESC, created_at DESC"
        );
        Ok(sqlx::query_as::<_, CampaignUpdate>(&sql)
            .bind(campaign_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_campaign_update(
        &self,
        actor: Uuid,
        update: &NewCampaignUpdate,
    ) -> StoreResult<CampaignUpdate> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            "INSERT INTO campaign_updates (campaign_id, update_date, content, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING {UPDATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CampaignUpdate>(&sql)
            .bind(update.campaign_id)
            .bind(update.update_date)
            .bind(&update.content)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "campaign update"))?;
        tx.commit().await?;
        Ok(row)
    }

    async fn delete_campaign_update(&self, actor: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.begin_as(actor).await?;
        let result = sqlx::query("DELETE FROM campaign_updates WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_testimonials(&self, active_only: bool) -> StoreResult<Vec<Testimonial>> {
        let sql = if active_only {
            format!(
                "SELECT {TESTIMONIAL_COLUMNS} FROM testimonials WHERE is_active \
                 ORDER BY display_order ASC"
            )
        } else {
            format!("SELECT {TESTIMONIAL_COLUMNS} FROM testimonials ORDER BY display_order ASC")
        };
        Ok(sqlx::query_as::<_, Testimonial>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_testimonial(
        &self,
        actor: Uuid,
        testimonial: &NewTestimonial,
    ) -> StoreResult<Testimonial> {
        let mut tx = self.begin_as(actor).await?;
        sqlx::query("LOCK TABLE testimonials IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        let sql = format!(
            r#"
            INSERT INTO testimonials (name, role, content, avatar_initials, is_active, display_order)
            VALUES ($1, $2, $3, $4, $5,
                    (SELECT COALESCE(MAX(display_order) + 1, 0) FROM testimonials))
            RETURNING {TESTIMONIAL_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Testimonial>(&sql)
            .bind(&testimonial.name)
            .bind(&testimonial.role)
            .bind(&testimonial.content)
            .bind(&testimonial.avatar_initials)
            .bind(testimonial.is_active)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_testimonial(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: &TestimonialChanges,
    ) -> StoreResult<Option<Testimonial>> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!("SELECT {TESTIMONIAL_COLUMNS} FROM testimonials WHERE id = $1 FOR UPDATE");
        let Some(existing) = sqlx::query_as::<_, Testimonial>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE testimonials
            SET name = $1, role = $2, content = $3, avatar_initials = $4, is_active = $5,
                updated_at = now()
            WHERE id = $6
            RETURNING {TESTIMONIAL_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Testimonial>(&sql)
            .bind(changes.name.as_ref().unwrap_or(&existing.name))
            .bind(changes.role.as_ref().unwrap_or(&existing.role))
            .bind(changes.content.as_ref().unwrap_or(&existing.content))
            .bind(changes.avatar_initials.clone().unwrap_or(existing.avatar_initials))
            .bind(changes.is_active.unwrap_or(existing.is_active))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete_testimonial(&self, actor: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.begin_as(actor).await?;
        let result = sqlx::query("DELETE FROM testimonials WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_testimonial_order(
        &self,
        actor: Uuid,
        id: Uuid,
        display_order: i32,
    ) -> StoreResult<bool> {
        let mut tx = self.begin_as(actor).await?;
        let result = sqlx::query(
            "UPDATE testimonials SET display_order = $1, updated_at = now() WHERE id = $2",
        )
        .bind(display_order)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_page_metadata(
        &self,
        page_path: &str,
        language: &str,
    ) -> StoreResult<Option<PageMetadata>> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM page_metadata WHERE page_path = $1 AND language_code = $2"
        );
        Ok(sqlx::query_as::<_, PageMetadata>(&sql)
            .bind(page_path)
            .bind(language)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_page_metadata(&self) -> StoreResult<Vec<PageMetadata>> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM page_metadata ORDER BY page_path, language_code"
        );
        Ok(sqlx::query_as::<_, PageMetadata>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_page_metadata(
        &self,
        actor: Uuid,
        input: &PageMetadataInput,
    ) -> StoreResult<PageMetadata> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            r#"
            INSERT INTO page_metadata
                (page_path, language_code, title, description, keywords, og_title, og_description,
                 og_image, twitter_card, twitter_title, twitter_description, twitter_image, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            ON CONFLICT (page_path, language_code) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                keywords = EXCLUDED.keywords,
                og_title = EXCLUDED.og_title,
                og_description = EXCLUDED.og_description,
                og_image = EXCLUDED.og_image,
                twitter_card = EXCLUDED.twitter_card,
                twitter_title = EXCLUDED.twitter_title,
                twitter_description = EXCLUDED.twitter_description,
                twitter_image = EXCLUDED.twitter_image,
                updated_at = now()
            RETURNING {METADATA_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PageMetadata>(&sql)
            .bind(&input.page_path)
            .bind(&input.language_code)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.keywords)
            .bind(&input.og_title)
            .bind(&input.og_description)
            .bind(&input.og_image)
            .bind(&input.twitter_card)
            .bind(&input.twitter_title)
            .bind(&input.twitter_description)
            .bind(&input.twitter_image)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn delete_page_metadata(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<PageMetadata>> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!("DELETE FROM page_metadata WHERE id = $1 RETURNING {METADATA_COLUMNS}");
        let deleted = sqlx::query_as::<_, PageMetadata>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn find_setting(&self, key: &str) -> StoreResult<Option<SiteSetting>> {
        let sql = format!("SELECT {SETTING_COLUMNS} FROM site_settings WHERE setting_key = $1");
        Ok(sqlx::query_as::<_, SiteSetting>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_settings(&self) -> StoreResult<Vec<SiteSetting>> {
        let sql = format!("SELECT {SETTING_COLUMNS} FROM site_settings ORDER BY setting_key");
        Ok(sqlx::query_as::<_, SiteSetting>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_setting(
        &self,
        actor: Uuid,
        key: &str,
        value: &Value,
        description: Option<&str>,
    ) -> StoreResult<SiteSetting> {
        let mut tx = self.begin_as(actor).await?;
        let sql = format!(
            r#"
            INSERT INTO site_settings (setting_key, setting_value, description, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (setting_key) DO UPDATE SET
                setting_value = EXCLUDED.setting_value,
                description = COALESCE(EXCLUDED.description, site_settings.description),
                updated_at = now()
            RETURNING {SETTING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SiteSetting>(&sql)
            .bind(key)
            .bind(value)
            .bind(description)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_audit_log(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditLogEntry>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE TRUE"));
        if let Some(table) = &filter.table_name {
            qb.push(" AND table_name = ").push_bind(table.clone());
        }
        if let Some(user) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(100).clamp(1, MAX_AUDIT_LIMIT));
        Ok(qb
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Privileged store, connected with the service credential.
#[derive(Clone)]
pub struct PgAdminDirectory {
    pool: PgPool,
}

impl PgAdminDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminDirectory for PgAdminDirectory {
    async fn find_admin(&self, identity: Uuid) -> StoreResult<Option<AdminUser>> {
        Ok(sqlx::query_as::<_, AdminUser>(
            "SELECT id, role, full_name, last_login FROM admin_users WHERE id = $1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_login(&self, identity: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE admin_users SET last_login = now() WHERE id = $1")
            .bind(identity)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgAdminDirectory {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<AuthIdentity>> {
        Ok(sqlx::query_as::<_, AuthIdentity>(
            "SELECT id, email, password_hash, created_at FROM auth_users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }
}
