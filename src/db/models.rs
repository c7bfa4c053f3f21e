//! Database Models - structs representing database tables (used by sqlx/serde),
//! plus the insert/update payloads the stores accept.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Distinguishes "field absent" (`None`) from "field set to null" (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Content sections
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentSection {
    pub id: Uuid,
    pub section_key: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentTranslation {
    pub id: Uuid,
    pub section_id: Uuid,
    pub language_code: String,
    pub content: Value,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Campaigns
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Campaign {
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
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub slug: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub goal_amount: i64,
    #[serde(default)]
    pub raised_amount: i64,
    #[serde(default)]
    pub donor_count: i32,
    #[serde(default)]
    pub days_left: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

fn default_status() -> String {
    "draft".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignChanges {
    pub slug: Option<String>,
    pub status: Option<String>,
    pub goal_amount: Option<i64>,
    pub raised_amount: Option<i64>,
    pub donor_count: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub days_left: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignTranslation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub language_code: String,
    pub title: String,
    pub story: String,
    pub full_story: Option<String>,
    pub child_name: Option<String>,
    pub child_age: Option<i32>,
    pub location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignTranslationInput {
    pub language_code: String,
    pub title: String,
    pub story: String,
    #[serde(default)]
    pub full_story: Option<String>,
    #[serde(default)]
    pub child_name: Option<String>,
    #[serde(default)]
    pub child_age: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CampaignImage {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub image_url: String,
    pub image_alt: Option<String>,
    pub is_primary: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaignImage {
    pub campaign_id: Uuid,
    pub image_url: String,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignImageChanges {
    #[serde(default, deserialize_with = "double_option")]
    pub image_alt: Option<Option<String>>,
    pub is_primary: Option<bool>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub update_date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaignUpdate {
    pub campaign_id: Uuid,
    pub update_date: NaiveDate,
    pub content: String,
}

// ============================================================================
// Testimonials
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub content: String,
    pub avatar_initials: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTestimonial {
    pub name: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub avatar_initials: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestimonialChanges {
    pub name: Option<String>,
    pub role: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_initials: Option<Option<String>>,
    pub is_active: Option<bool>,
}

// ============================================================================
// Page metadata and settings
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PageMetadata {
    pub id: Uuid,
    pub page_path: String,
    pub language_code: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub twitter_card: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadataInput {
    pub page_path: String,
    pub language_code: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub og_title: Option<String>,
    #[serde(default)]
    pub og_description: Option<String>,
    #[serde(default)]
    pub og_image: Option<String>,
    #[serde(default)]
    pub twitter_card: Option<String>,
    #[serde(default)]
    pub twitter_title: Option<String>,
    #[serde(default)]
    pub twitter_description: Option<String>,
    #[serde(default)]
    pub twitter_image: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SiteSetting {
    pub id: Uuid,
    pub setting_key: String,
    pub setting_value: Value,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Audit and identities
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: Option<String>,
    pub action: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub table_name: Option<String>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Privileged role record keyed by the authenticated identity.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub role: String,
    pub full_name: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Authenticated identity (credential record), independent of any role.
#[derive(Debug, Clone, FromRow)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
