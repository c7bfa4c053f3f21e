//! Localized content sections.
//!
//! Each section key has its own document schema. Stored rows hold only the
//! inner document; [`SectionDocument`] adds the key as a tag so both sides of
//! the wire share one validated contract.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::cache::mark_degraded;
use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::{ContentSection, ContentTranslation};
use crate::i18n::{resolve_with_fallback, Language};

// ============================================================================
// Section documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeroContent {
    pub title: String,
    pub subtitle: String,
    #[serde(default)]
    pub cta_primary: Option<String>,
    #[serde(default)]
    pub cta_secondary: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionContent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuesContent {
    #[serde(default)]
    pub title: Option<String>,
    pub items: Vec<ValueItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatItem {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImpactContent {
    #[serde(default)]
    pub title: Option<String>,
    pub stats: Vec<StatItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoryContent {
    pub title: String,
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamMember {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamContent {
    #[serde(default)]
    pub title: Option<String>,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MentorshipContent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub cta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImpactLevel {
    pub amount: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DonateInfoContent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub impact_levels: Vec<ImpactLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactInfoContent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaqContent {
    #[serde(default)]
    pub title: Option<String>,
    pub items: Vec<FaqItem>,
}

/// A section's content, tagged by its section key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", content = "content", rename_all = "snake_case")]
pub enum SectionDocument {
    Hero(HeroContent),
    Mission(MissionContent),
    Values(ValuesContent),
    Impact(ImpactContent),
    Story(StoryContent),
    Team(TeamContent),
    Mentorship(MentorshipContent),
    DonateInfo(DonateInfoContent),
    ContactInfo(ContactInfoContent),
    Faq(FaqContent),
}

impl SectionDocument {
    pub const KEYS: [&'static str; 10] = [
        "hero",
        "mission",
        "values",
        "impact",
        "story",
        "team",
        "mentorship",
        "donate_info",
        "contact_info",
        "faq",
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SectionDocument::Hero(_) => "hero",
            SectionDocument::Mission(_) => "mission",
            SectionDocument::Values(_) => "values",
            SectionDocument::Impact(_) => "impact",
            SectionDocument::Story(_) => "story",
            SectionDocument::Team(_) => "team",
            SectionDocument::Mentorship(_) => "mentorship",
            SectionDocument::DonateInfo(_) => "donate_info",
            SectionDocument::ContactInfo(_) => "contact_info",
            SectionDocument::Faq(_) => "faq",
        }
    }

    /// Decodes a stored document for `key`.
    pub fn decode(key: &str, content: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "section": key, "content": content }))
    }

    /// The inner document, as stored.
    pub fn content(&self) -> Result<Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("content")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Pages that render this section.
    fn pages(key: &str) -> &'static [&'static str] {
        match key {
            "hero" => &["/"],
            "mission" | "impact" => &["/", "/about"],
            "values" | "story" | "team" => &["/about"],
            "mentorship" => &["/mentorship"],
            "donate_info" => &["/donate"],
            "contact_info" => &["/contact"],
            "faq" => &["/donate", "/contact", "/mentorship"],
            _ => &[],
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

impl Cms {
    /// The section's document in `language`, else in English, else `None`.
    pub async fn get_section_content(
        &self,
        section_key: &str,
        language: &str,
    ) -> Option<SectionDocument> {
        let section = match self.store.find_section(section_key).await {
            Ok(Some(section)) => section,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(section = section_key, error = %e, "failed to load section");
                mark_degraded();
                return None;
            }
        };

        let section_id = section.id;
        let store = self.store.clone();
        let translation = resolve_with_fallback(language, |lang| {
            let store = store.clone();
            async move { store.find_section_translation(section_id, &lang).await }
        })
        .await?;

        match SectionDocument::decode(section_key, translation.content) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(
                    section = section_key,
                    language = %translation.language_code,
                    error = %e,
                    "stored section no longer matches its schema"
                );
                None
            }
        }
    }

    /// Several sections at once; missing sections are absent from the map.
    pub async fn get_sections(
        &self,
        section_keys: &[&str],
        language: &str,
    ) -> BTreeMap<String, SectionDocument> {
        let lookups = section_keys
            .iter()
            .map(|key| self.get_section_content(key, language));
        section_keys
            .iter()
            .zip(join_all(lookups).await)
            .filter_map(|(key, doc)| doc.map(|doc| (key.to_string(), doc)))
            .collect()
    }

    pub async fn list_sections(&self, caller: &Caller) -> Vec<ContentSection> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        self.store.list_sections().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to list sections");
            Vec::new()
        })
    }

    /// Every language's row for one section, for the editor.
    pub async fn list_section_translations(
        &self,
        caller: &Caller,
        section_key: &str,
    ) -> Vec<ContentTranslation> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        let section = match self.store.find_section(section_key).await {
            Ok(Some(section)) => section,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(section = section_key, error = %e, "failed to load section");
                return Vec::new();
            }
        };
        self.store
            .list_section_translations(section.id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(section = section_key, error = %e, "failed to list translations");
                Vec::new()
            })
    }

    /// Replaces the document for `(section_key, language)`, creating the
    /// section on first write. Other languages are untouched.
    pub async fn upsert_section_content(
        &self,
        caller: &Caller,
        section_key: &str,
        language: Language,
        content: Value,
    ) -> ActionResult<ContentTranslation> {
        let admin = self.require_admin(caller).await?;

        if !SectionDocument::KEYS.contains(&section_key) {
            return Err(ActionError::validation(format!(
                "Unknown section '{}'",
                section_key
            )));
        }
        let document = SectionDocument::decode(section_key, content).map_err(|e| {
            ActionError::validation(format!("Invalid content for '{}': {}", section_key, e))
        })?;
        let content = document.content().map_err(|e| ActionError::Backend(e.to_string()))?;

        let section = match self.store.find_section(section_key).await? {
            Some(section) => section,
            None => self.store.insert_section(admin.id, section_key, "json").await?,
        };

        let row = self
            .store
            .upsert_section_translation(admin.id, section.id, language.code(), &content)
            .await?;

        tracing::info!(section = section_key, language = %language, "section content saved");
        self.revalidate(SectionDocument::pages(section_key)).await;
        Ok(row)
    }
}
