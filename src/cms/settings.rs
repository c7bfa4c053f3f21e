//! Site settings: a generic key/value store with typed accessors for the
//! well-known keys.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::cache::mark_degraded;
use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::SiteSetting;

pub const HERO_STATS: &str = "hero_stats";
pub const CONTACT_INFO: &str = "contact_info";
pub const SOCIAL_LINKS: &str = "social_links";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeroStats {
    pub children_helped: u64,
    pub campaigns_funded: u64,
    pub donors: u64,
    pub communities: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub hours: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
}

lazy_static::lazy_static! {
    static ref SETTING_KEY_REGEX: regex::Regex = regex::Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
}

/// Well-known keys must match their typed shape.
fn validate_setting(key: &str, value: &Value) -> ActionResult<()> {
    fn check<T: DeserializeOwned>(key: &str, value: &Value) -> ActionResult<()> {
        serde_json::from_value::<T>(value.clone())
            .map(|_| ())
            .map_err(|e| ActionError::validation(format!("Invalid value for '{}': {}", key, e)))
    }
    match key {
        HERO_STATS => check::<HeroStats>(key, value),
        CONTACT_INFO => check::<ContactInfo>(key, value),
        SOCIAL_LINKS => check::<SocialLinks>(key, value),
        _ => Ok(()),
    }
}

impl Cms {
    pub async fn get_setting(&self, key: &str) -> Option<Value> {
        match self.store.find_setting(key).await {
            Ok(row) => row.map(|s| s.setting_value),
            Err(e) => {
                tracing::error!(key, error = %e, "failed to load setting");
                mark_degraded();
                None
            }
        }
    }

    /// The setting decoded as `T`; the default when missing or malformed.
    pub async fn typed_setting<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(value) = self.get_setting(key).await else {
            return T::default();
        };
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "setting does not match its schema");
            T::default()
        })
    }

    pub async fn hero_stats(&self) -> HeroStats {
        self.typed_setting(HERO_STATS).await
    }

    pub async fn contact_info(&self) -> ContactInfo {
        self.typed_setting(CONTACT_INFO).await
    }

    pub async fn social_links(&self) -> SocialLinks {
        self.typed_setting(SOCIAL_LINKS).await
    }

    pub async fn list_settings(&self, caller: &Caller) -> Vec<SiteSetting> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        self.store.list_settings().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to list settings");
            Vec::new()
        })
    }

    pub async fn upsert_setting(
        &self,
        caller: &Caller,
        key: &str,
        value: Value,
        description: Option<&str>,
    ) -> ActionResult<SiteSetting> {
        let admin = self.require_admin(caller).await?;
        if !SETTING_KEY_REGEX.is_match(key) {
            return Err(ActionError::validation(
                "Setting key must be lowercase letters, digits and underscores",
            ));
        }
        validate_setting(key, &value)?;

        let row = self
            .store
            .upsert_setting(admin.id, key, &value, description)
            .await?;
        tracing::info!(key, "setting saved");
        // Settings appear in the shared layout.
        self.revalidate(&["/", "/about", "/campaigns", "/donate", "/contact", "/mentorship"])
            .await;
        Ok(row)
    }
}
