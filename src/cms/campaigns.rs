//! Campaign queries, view-model projection and administration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cache::mark_degraded;
use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::{
    Campaign, CampaignChanges, CampaignImage, CampaignTranslation, CampaignTranslationInput,
    NewCampaign,
};
use crate::i18n::Language;
use crate::store::{CampaignFilter, CampaignRef};

pub const CAMPAIGN_STATUSES: [&str; 4] = ["draft", "active", "completed", "archived"];

lazy_static::lazy_static! {
    /// Lowercase letters, numbers and single hyphens.
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();

    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// An identifier shaped like a UUID addresses by id, anything else by slug.
pub fn campaign_ref(identifier: &str) -> CampaignRef {
    if UUID_REGEX.is_match(identifier) {
        if let Ok(id) = Uuid::parse_str(identifier) {
            return CampaignRef::Id(id);
        }
    }
    CampaignRef::Slug(identifier.to_string())
}

fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

// ============================================================================
// View model
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignQuery {
    pub featured: Option<bool>,
    pub limit: Option<i64>,
    /// A status, or `all`.
    pub status: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

impl CampaignQuery {
    /// Public callers see only active campaigns unless they ask for a
    /// specific status; admin callers see every status by default.
    pub fn effective_status(&self) -> Option<String> {
        match self.status.as_deref() {
            Some(status) if status != "all" => Some(status.to_string()),
            _ if self.admin => None,
            _ => Some("active".to_string()),
        }
    }
}

/// A campaign flattened with one translation and its ordered images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignView {
    pub id: Uuid,
    pub slug: String,
    pub status: String,
    pub goal_amount: i64,
    pub raised_amount: i64,
    pub donor_count: i32,
    pub days_left: Option<i32>,
    pub category: Option<String>,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub story: String,
    pub full_story: Option<String>,
    pub child_name: Option<String>,
    pub child_age: Option<i32>,
    pub location: Option<String>,
    /// Language the title and story are in.
    pub translation_language: String,
    /// True when the requested language had no row and English was used.
    pub is_fallback: bool,
    pub image: Option<String>,
    pub image_alt: Option<String>,
    pub images: Vec<CampaignImage>,
    /// Percent of goal raised, capped at 100.
    pub progress: u8,
}

fn progress(raised: i64, goal: i64) -> u8 {
    if goal <= 0 {
        return 0;
    }
    ((raised.max(0) as f64 / goal as f64) * 100.0).round().min(100.0) as u8
}

/// Requested row wins; English fills the optional fields it lacks.
fn project(
    campaign: Campaign,
    requested: Option<&CampaignTranslation>,
    english: Option<&CampaignTranslation>,
    mut images: Vec<CampaignImage>,
) -> Option<CampaignView> {
    let (primary, is_fallback) = match (requested, english) {
        (Some(tr), _) => (tr, false),
        (None, Some(en)) => (en, true),
        (None, None) => return None,
    };
    let secondary = if is_fallback { None } else { english };
    let fill = |pick: fn(&CampaignTranslation) -> Option<String>| {
        pick(primary).or_else(|| secondary.and_then(pick))
    };

    images.sort_by_key(|i| i.display_order);
    let cover = images
        .iter()
        .find(|i| i.is_primary)
        .or_else(|| images.first());

    Some(CampaignView {
        progress: progress(campaign.raised_amount, campaign.goal_amount),
        image: cover.map(|i| i.image_url.clone()),
        image_alt: cover.and_then(|i| i.image_alt.clone()),
        title: primary.title.clone(),
        story: primary.story.clone(),
        full_story: fill(|t| t.full_story.clone()),
        child_name: fill(|t| t.child_name.clone()),
        child_age: primary
            .child_age
            .or_else(|| secondary.and_then(|t| t.child_age)),
        location: fill(|t| t.location.clone()),
        translation_language: primary.language_code.clone(),
        is_fallback,
        images,
        id: campaign.id,
        slug: campaign.slug,
        status: campaign.status,
        goal_amount: campaign.goal_amount,
        raised_amount: campaign.raised_amount,
        donor_count: campaign.donor_count,
        days_left: campaign.days_left,
        category: campaign.category,
        featured: campaign.featured,
        created_at: campaign.created_at,
        updated_at: campaign.updated_at,
    })
}

/// Create payload: campaign fields plus at least one translation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    #[serde(flatten)]
    pub campaign: NewCampaign,
    pub translations: Vec<CampaignTranslationInput>,
}

fn validate_status(status: &str) -> ActionResult<()> {
    if CAMPAIGN_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ActionError::validation(format!(
            "Invalid status '{}'. Allowed: {}",
            status,
            CAMPAIGN_STATUSES.join(", ")
        )))
    }
}

fn validate_slug(slug: &str) -> ActionResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ActionError::validation(
            "Slug must contain only lowercase letters, numbers, and hyphens",
        ))
    }
}

fn validate_amounts(goal: Option<i64>, raised: Option<i64>, donors: Option<i32>) -> ActionResult<()> {
    if goal.is_some_and(|g| g <= 0) {
        return Err(ActionError::validation("Goal amount must be greater than zero"));
    }
    if raised.is_some_and(|r| r < 0) || donors.is_some_and(|d| d < 0) {
        return Err(ActionError::validation("Amounts cannot be negative"));
    }
    Ok(())
}

/// Checks the language and required text, and sanitizes the stories.
fn clean_translation(input: &CampaignTranslationInput) -> ActionResult<CampaignTranslationInput> {
    let language: Language = input
        .language_code
        .parse()
        .map_err(|e: crate::i18n::UnsupportedLanguage| ActionError::validation(e.to_string()))?;
    if input.title.trim().is_empty() {
        return Err(ActionError::validation("Title is required"));
    }
    if input.story.trim().is_empty() {
        return Err(ActionError::validation("Story is required"));
    }
    if input.child_age.is_some_and(|age| !(0..=30).contains(&age)) {
        return Err(ActionError::validation("Child age is out of range"));
    }
    Ok(CampaignTranslationInput {
        language_code: language.code().to_string(),
        title: input.title.trim().to_string(),
        story: sanitize_html(&input.story),
        full_story: input.full_story.as_deref().map(sanitize_html),
        child_name: input.child_name.clone(),
        child_age: input.child_age,
        location: input.location.clone(),
    })
}

// ============================================================================
// Operations
// ============================================================================

impl Cms {
    async fn assemble(&self, campaigns: Vec<Campaign>, language: &str) -> Vec<CampaignView> {
        if campaigns.is_empty() {
            return Vec::new();
        }
        let ids: Vec<Uuid> = campaigns.iter().map(|c| c.id).collect();
        let fallback = Language::FALLBACK.code();
        let languages: Vec<&str> = if language == fallback {
            vec![fallback]
        } else {
            vec![language, fallback]
        };

        let (translations, images) = tokio::join!(
            self.store.list_campaign_translations(&ids, &languages),
            self.store.list_campaign_images(&ids)
        );
        let translations = translations.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load campaign translations");
            mark_degraded();
            Vec::new()
        });
        let images = images.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load campaign images");
            mark_degraded();
            Vec::new()
        });

        let mut by_campaign: HashMap<Uuid, Vec<CampaignImage>> = HashMap::new();
        for image in images {
            by_campaign.entry(image.campaign_id).or_default().push(image);
        }

        campaigns
            .into_iter()
            .filter_map(|campaign| {
                let find = |lang: &str| {
                    translations
                        .iter()
                        .find(|t| t.campaign_id == campaign.id && t.language_code == lang)
                };
                let requested = find(language);
                let english = find(fallback);
                let images = by_campaign.remove(&campaign.id).unwrap_or_default();
                project(campaign, requested, english, images)
            })
            .collect()
    }

    /// Campaigns newest first, each in `language` or English.
    pub async fn get_campaigns(&self, language: &str, query: &CampaignQuery) -> Vec<CampaignView> {
        let filter = CampaignFilter {
            status: query.effective_status(),
            featured: query.featured,
            limit: query.limit,
        };
        let campaigns = match self.store.list_campaigns(&filter).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "failed to list campaigns");
                mark_degraded();
                return Vec::new();
            }
        };
        self.assemble(campaigns, language).await
    }

    /// One campaign by id or slug.
    pub async fn get_campaign(&self, identifier: &str, language: &str) -> Option<CampaignView> {
        let campaign = match self.store.find_campaign(&campaign_ref(identifier)).await {
            Ok(found) => found?,
            Err(e) => {
                tracing::error!(identifier, error = %e, "failed to load campaign");
                mark_degraded();
                return None;
            }
        };
        self.assemble(vec![campaign], language).await.pop()
    }

    /// Admin listing across every status unless one is named.
    pub async fn admin_list_campaigns(
        &self,
        caller: &Caller,
        language: &str,
        status: Option<String>,
    ) -> Vec<CampaignView> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        let query = CampaignQuery {
            status,
            admin: true,
            ..Default::default()
        };
        self.get_campaigns(language, &query).await
    }

    pub async fn create_campaign(
        &self,
        caller: &Caller,
        input: CreateCampaign,
    ) -> ActionResult<Campaign> {
        let admin = self.require_admin(caller).await?;

        let campaign = input.campaign;
        validate_slug(&campaign.slug)?;
        validate_status(&campaign.status)?;
        validate_amounts(
            Some(campaign.goal_amount),
            Some(campaign.raised_amount),
            Some(campaign.donor_count),
        )?;
        if input.translations.is_empty() {
            return Err(ActionError::validation("At least one translation is required"));
        }
        let translations = input
            .translations
            .iter()
            .map(clean_translation)
            .collect::<ActionResult<Vec<_>>>()?;
        for (i, tr) in translations.iter().enumerate() {
            if translations[..i]
                .iter()
                .any(|other| other.language_code == tr.language_code)
            {
                return Err(ActionError::validation(format!(
                    "Duplicate translation for '{}'",
                    tr.language_code
                )));
            }
        }
        // Every other language falls back to English, so it must exist.
        let fallback = Language::FALLBACK.code();
        if !translations.iter().any(|tr| tr.language_code == fallback) {
            return Err(ActionError::validation("An English translation is required"));
        }

        let row = self
            .store
            .insert_campaign(admin.id, &campaign, &translations)
            .await
            .map_err(|e| match ActionError::from(e) {
                ActionError::Conflict(_) => {
                    ActionError::Conflict("A campaign with this slug already exists".to_string())
                }
                other => other,
            })?;

        tracing::info!(campaign = %row.id, slug = %row.slug, "campaign created");
        self.revalidate(&["/", "/campaigns", "/donate"]).await;
        Ok(row)
    }

    pub async fn update_campaign(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: CampaignChanges,
    ) -> ActionResult<Campaign> {
        let admin = self.require_admin(caller).await?;

        if let Some(slug) = &changes.slug {
            validate_slug(slug)?;
        }
        if let Some(status) = &changes.status {
            validate_status(status)?;
        }
        validate_amounts(changes.goal_amount, changes.raised_amount, changes.donor_count)?;

        let previous = self.store.find_campaign(&CampaignRef::Id(id)).await?;
        let row = self
            .store
            .update_campaign(admin.id, id, &changes)
            .await?
            .ok_or_else(|| ActionError::not_found("Campaign not found"))?;

        tracing::info!(campaign = %id, "campaign updated");
        let detail = format!("/campaigns/{}", row.slug);
        let mut paths = vec!["/", "/campaigns", "/donate", detail.as_str()];
        let old_detail = previous
            .filter(|p| p.slug != row.slug)
            .map(|p| format!("/campaigns/{}", p.slug));
        if let Some(old) = &old_detail {
            paths.push(old.as_str());
        }
        self.revalidate(&paths).await;
        Ok(row)
    }

    /// Deletes the campaign (its rows cascade) and then, best effort, its
    /// stored images.
    pub async fn delete_campaign(&self, caller: &Caller, id: Uuid) -> ActionResult<()> {
        let admin = self.require_admin(caller).await?;

        let existing = self
            .store
            .find_campaign(&CampaignRef::Id(id))
            .await?
            .ok_or_else(|| ActionError::not_found("Campaign not found"))?;
        if !self.store.delete_campaign(admin.id, id).await? {
            return Err(ActionError::not_found("Campaign not found"));
        }

        let folder = format!("campaigns/{}", id);
        match self.storage.list(&folder).await {
            Ok(objects) if !objects.is_empty() => {
                let paths: Vec<String> = objects.into_iter().map(|o| o.path).collect();
                if let Err(e) = self.storage.remove(&paths).await {
                    tracing::warn!(campaign = %id, error = %e, "failed to remove campaign images");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(campaign = %id, error = %e, "failed to list campaign images"),
        }

        tracing::info!(campaign = %id, slug = %existing.slug, "campaign deleted");
        let detail = format!("/campaigns/{}", existing.slug);
        self.revalidate(&["/", "/campaigns", "/donate", detail.as_str()])
            .await;
        Ok(())
    }

    /// Every language's row for one campaign, for the editor tabs.
    pub async fn list_campaign_translations(
        &self,
        caller: &Caller,
        campaign_id: Uuid,
    ) -> Vec<CampaignTranslation> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        let languages = Language::ALL.map(Language::code);
        let mut rows = self
            .store
            .list_campaign_translations(&[campaign_id], &languages)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(campaign = %campaign_id, error = %e, "failed to list translations");
                Vec::new()
            });
        rows.sort_by(|a, b| a.language_code.cmp(&b.language_code));
        rows
    }

    pub async fn upsert_campaign_translation(
        &self,
        caller: &Caller,
        campaign_id: Uuid,
        input: CampaignTranslationInput,
    ) -> ActionResult<CampaignTranslation> {
        let admin = self.require_admin(caller).await?;
        let translation = clean_translation(&input)?;

        let campaign = self
            .store
            .find_campaign(&CampaignRef::Id(campaign_id))
            .await?
            .ok_or_else(|| ActionError::not_found("Campaign not found"))?;
        let row = self
            .store
            .upsert_campaign_translation(admin.id, campaign_id, &translation)
            .await?;

        tracing::info!(
            campaign = %campaign_id,
            language = %row.language_code,
            "campaign translation saved"
        );
        let detail = format!("/campaigns/{}", campaign.slug);
        self.revalidate(&["/", "/campaigns", detail.as_str()]).await;
        Ok(row)
    }

    /// Seeds `target` with a copy of the English translation for translators
    /// to edit. Overwrites an existing `target` row.
    pub async fn copy_translation_from_english(
        &self,
        caller: &Caller,
        campaign_id: Uuid,
        target: Language,
    ) -> ActionResult<CampaignTranslation> {
        self.require_admin(caller).await?;
        if target.is_fallback() {
            return Err(ActionError::validation("Target language must not be English"));
        }

        let english = self
            .store
            .list_campaign_translations(&[campaign_id], &[Language::FALLBACK.code()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ActionError::not_found("English translation not found"))?;

        let copy = CampaignTranslationInput {
            language_code: target.code().to_string(),
            title: english.title,
            story: english.story,
            full_story: english.full_story,
            child_name: english.child_name,
            child_age: english.child_age,
            location: english.location,
        };
        self.upsert_campaign_translation(caller, campaign_id, copy)
            .await
    }
}
