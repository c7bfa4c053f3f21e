//! Page metadata and SEO tag resolution.
//!
//! Each field resolves independently: the requested language's row, then the
//! English row, then the page's built-in default.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cache::mark_degraded;
use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::{PageMetadata, PageMetadataInput};
use crate::i18n::Language;

const DEFAULT_TWITTER_CARD: &str = "summary_large_image";

/// Built-in title and description per public page.
fn page_defaults(page_path: &str) -> (&'static str, &'static str) {
    match page_path {
        "/" => (
            "Home",
            "Supporting children and families through education, mentorship and community campaigns.",
        ),
        "/about" => (
            "About Us",
            "Our mission, our values and the team behind the foundation.",
        ),
        "/campaigns" => (
            "Campaigns",
            "Browse active campaigns and help a child reach their goal.",
        ),
        "/donate" => (
            "Donate",
            "Make a one-time or monthly donation to support our programs.",
        ),
        "/contact" => ("Contact", "Get in touch with our team."),
        "/mentorship" => (
            "Mentorship",
            "Become a mentor and make a lasting difference in a young person's life.",
        ),
        _ => ("", "Supporting children and families."),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    pub url: String,
    pub site_name: String,
    pub locale: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterCard {
    pub card: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternate {
    pub hreflang: String,
    pub href: String,
}

/// Everything a page head needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSeo {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub canonical: String,
    pub open_graph: OpenGraph,
    pub twitter: TwitterCard,
    pub alternates: Vec<Alternate>,
}

/// Defaults supplied by the caller for pages whose content is dynamic, such as
/// a campaign's title and cover image.
#[derive(Debug, Clone, Default)]
pub struct SeoDefaults {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Normalises to a leading slash and no trailing slash (except for `/`).
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

impl Cms {
    fn page_url(&self, path: &str, language: Language) -> String {
        let base = format!("{}{}", self.site.url, if path == "/" { "" } else { path });
        let base = if base.is_empty() { "/".to_string() } else { base };
        if language.is_fallback() {
            base
        } else {
            format!("{}?lang={}", base, language.code())
        }
    }

    async fn find_metadata(&self, path: &str, language: &str) -> Option<PageMetadata> {
        match self.store.find_page_metadata(path, language).await {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(path, language, error = %e, "failed to load page metadata");
                mark_degraded();
                None
            }
        }
    }

    /// Resolves the SEO tags for `page_path`.
    pub async fn get_page_seo(&self, page_path: &str, language: Language) -> PageSeo {
        self.get_page_seo_with(page_path, language, SeoDefaults::default())
            .await
    }

    pub async fn get_page_seo_with(
        &self,
        page_path: &str,
        language: Language,
        defaults: SeoDefaults,
    ) -> PageSeo {
        let path = normalize_path(page_path);
        let (requested, english) = if language.is_fallback() {
            (self.find_metadata(&path, language.code()).await, None)
        } else {
            tokio::join!(
                self.find_metadata(&path, language.code()),
                self.find_metadata(&path, Language::FALLBACK.code())
            )
        };

        // Blank values count as missing, so they fall through to English.
        let pick = |field: fn(&PageMetadata) -> Option<String>| {
            let filled = |row: Option<&PageMetadata>| {
                row.and_then(field).filter(|v| !v.trim().is_empty())
            };
            filled(requested.as_ref()).or_else(|| filled(english.as_ref()))
        };

        let (default_title, default_description) = page_defaults(&path);
        let page_title = pick(|m| m.title.clone())
            .or(defaults.title)
            .unwrap_or_else(|| default_title.to_string());
        let title = if page_title.is_empty() {
            self.site.name.clone()
        } else {
            format!("{} | {}", page_title, self.site.name)
        };
        let description = pick(|m| m.description.clone())
            .or(defaults.description)
            .unwrap_or_else(|| default_description.to_string());
        let keywords = [requested.as_ref(), english.as_ref()]
            .into_iter()
            .flatten()
            .map(|m| m.keywords.clone())
            .find(|k| !k.is_empty())
            .unwrap_or_default();

        let og_image = pick(|m| m.og_image.clone()).or(defaults.image);
        let canonical = self.page_url(&path, language);

        let open_graph = OpenGraph {
            title: pick(|m| m.og_title.clone()).unwrap_or_else(|| title.clone()),
            description: pick(|m| m.og_description.clone())
                .unwrap_or_else(|| description.clone()),
            url: canonical.clone(),
            site_name: self.site.name.clone(),
            locale: language.locale().to_string(),
            kind: "website".to_string(),
            image: og_image.clone(),
        };
        let twitter = TwitterCard {
            card: pick(|m| m.twitter_card.clone())
                .unwrap_or_else(|| DEFAULT_TWITTER_CARD.to_string()),
            title: pick(|m| m.twitter_title.clone()).unwrap_or_else(|| open_graph.title.clone()),
            description: pick(|m| m.twitter_description.clone())
                .unwrap_or_else(|| open_graph.description.clone()),
            image: pick(|m| m.twitter_image.clone()).or(og_image),
        };

        let mut alternates: Vec<Alternate> = Language::ALL
            .iter()
            .map(|lang| Alternate {
                hreflang: lang.code().to_string(),
                href: self.page_url(&path, *lang),
            })
            .collect();
        alternates.push(Alternate {
            hreflang: "x-default".to_string(),
            href: self.page_url(&path, Language::FALLBACK),
        });

        PageSeo {
            title,
            description,
            keywords,
            canonical,
            open_graph,
            twitter,
            alternates,
        }
    }

    pub async fn list_page_metadata(&self, caller: &Caller) -> Vec<PageMetadata> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        self.store.list_page_metadata().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to list page metadata");
            Vec::new()
        })
    }

    pub async fn upsert_page_metadata(
        &self,
        caller: &Caller,
        input: PageMetadataInput,
    ) -> ActionResult<PageMetadata> {
        let admin = self.require_admin(caller).await?;
        if !input.page_path.trim().starts_with('/') {
            return Err(ActionError::validation("Page path must start with '/'"));
        }
        let language: Language = input
            .language_code
            .parse()
            .map_err(|e: crate::i18n::UnsupportedLanguage| ActionError::validation(e.to_string()))?;

        let input = PageMetadataInput {
            page_path: normalize_path(&input.page_path),
            language_code: language.code().to_string(),
            keywords: input
                .keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            ..input
        };
        let row = self.store.upsert_page_metadata(admin.id, &input).await?;

        tracing::info!(path = %row.page_path, language = %row.language_code, "page metadata saved");
        self.revalidate(&[row.page_path.as_str()]).await;
        Ok(row)
    }

    pub async fn delete_page_metadata(&self, caller: &Caller, id: Uuid) -> ActionResult<()> {
        let admin = self.require_admin(caller).await?;
        let Some(row) = self.store.delete_page_metadata(admin.id, id).await? else {
            return Err(ActionError::not_found("Page metadata not found"));
        };
        tracing::info!(path = %row.page_path, language = %row.language_code, "page metadata deleted");
        self.revalidate(&[row.page_path.as_str()]).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::testing::fixture;

    fn input(path: &str, lang: &str) -> PageMetadataInput {
        PageMetadataInput {
            page_path: path.to_string(),
            language_code: lang.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/about/"), "/about");
        assert_eq!(normalize_path("donate"), "/donate");
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_stored() {
        let fx = fixture().await;
        let seo = fx.cms.get_page_seo("/donate", Language::En).await;
        assert_eq!(seo.title, "Donate | Hope Foundation");
        assert_eq!(seo.canonical, "https://example.org/donate");
        assert_eq!(seo.twitter.card, "summary_large_image");
        assert_eq!(seo.open_graph.title, seo.title);
        assert!(seo.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_fields_fall_back_to_english_row_individually() {
        let fx = fixture().await;
        fx.cms
            .upsert_page_metadata(
                &fx.admin,
                PageMetadataInput {
                    title: Some("About".to_string()),
                    description: Some("English description".to_string()),
                    keywords: vec!["charity".to_string()],
                    og_image: Some("https://cdn.example.org/og.jpg".to_string()),
                    ..input("/about", "en")
                },
            )
            .await
            .unwrap();
        fx.cms
            .upsert_page_metadata(
                &fx.admin,
                PageMetadataInput {
                    title: Some("À propos".to_string()),
                    ..input("/about", "fr")
                },
            )
            .await
            .unwrap();

        let seo = fx.cms.get_page_seo("/about", Language::Fr).await;
        assert_eq!(seo.title, "À propos | Hope Foundation");
        assert_eq!(seo.description, "English description");
        assert_eq!(seo.keywords, vec!["charity".to_string()]);
        assert_eq!(seo.open_graph.locale, "fr_FR");
        assert_eq!(seo.canonical, "https://example.org/about?lang=fr");
        assert_eq!(
            seo.twitter.image.as_deref(),
            Some("https://cdn.example.org/og.jpg")
        );
    }

    #[tokio::test]
    async fn test_blank_translation_falls_back_to_english() {
        let fx = fixture().await;
        fx.cms
            .upsert_page_metadata(
                &fx.admin,
                PageMetadataInput {
                    title: Some("Donate".to_string()),
                    description: Some("Give a child a future".to_string()),
                    ..input("/donate", "en")
                },
            )
            .await
            .unwrap();
        fx.cms
            .upsert_page_metadata(
                &fx.admin,
                PageMetadataInput {
                    title: Some("Faire un don".to_string()),
                    description: Some("   ".to_string()),
                    ..input("/donate", "fr")
                },
            )
            .await
            .unwrap();

        let seo = fx.cms.get_page_seo("/donate", Language::Fr).await;
        assert_eq!(seo.title, "Faire un don | Hope Foundation");
        assert_eq!(seo.description, "Give a child a future");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let fx = fixture().await;
        let row = fx
            .cms
            .upsert_page_metadata(&fx.admin, input("/about", "en"))
            .await
            .unwrap();
        fx.cms.delete_page_metadata(&fx.admin, row.id).await.unwrap();
        assert!(matches!(
            fx.cms.delete_page_metadata(&fx.admin, row.id).await,
            Err(ActionError::NotFound(_))
        ));
        assert!(fx.cms.list_page_metadata(&fx.admin).await.is_empty());
    }

    #[tokio::test]
    async fn test_alternates_cover_every_language() {
        let fx = fixture().await;
        let seo = fx.cms.get_page_seo("/", Language::Zh).await;
        let langs: Vec<&str> = seo.alternates.iter().map(|a| a.hreflang.as_str()).collect();
        assert_eq!(langs, vec!["en", "fr", "zh", "x-default"]);
        assert_eq!(seo.alternates[3].href, "https://example.org");
        assert_eq!(seo.title, "Home | Hope Foundation");
    }

    #[tokio::test]
    async fn test_upsert_validates_path_and_language() {
        let fx = fixture().await;
        assert!(matches!(
            fx.cms.upsert_page_metadata(&fx.admin, input("about", "en")).await,
            Err(ActionError::Validation(_))
        ));
        assert!(matches!(
            fx.cms.upsert_page_metadata(&fx.admin, input("/about", "de")).await,
            Err(ActionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_uses_defaults() {
        let fx = fixture().await;
        fx.store.set_failing(true);
        let seo = fx.cms.get_page_seo("/campaigns", Language::Fr).await;
        assert_eq!(seo.title, "Campaigns | Hope Foundation");
    }
}
