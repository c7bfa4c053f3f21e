//! Public page view models.
//!
//! Each page issues its reads concurrently and caches the assembled JSON per
//! (path, language) until a write revalidates the path or the TTL runs out.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::cms::campaigns::{CampaignQuery, CampaignView};
use crate::cms::metadata::{PageSeo, SeoDefaults};
use crate::cms::sections::SectionDocument;
use crate::cms::settings::{ContactInfo, HeroStats, SocialLinks};
use crate::cms::cache::track_degraded;
use crate::cms::{Cms, PageCache};
use crate::db::models::{CampaignUpdate, Testimonial};
use crate::i18n::Language;

type Sections = BTreeMap<String, SectionDocument>;

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub seo: PageSeo,
    pub sections: Sections,
    pub featured_campaigns: Vec<CampaignView>,
    pub testimonials: Vec<Testimonial>,
    pub hero_stats: HeroStats,
}

#[derive(Debug, Serialize)]
pub struct AboutPage {
    pub seo: PageSeo,
    pub sections: Sections,
}

#[derive(Debug, Serialize)]
pub struct CampaignsPage {
    pub seo: PageSeo,
    pub campaigns: Vec<CampaignView>,
}

#[derive(Debug, Serialize)]
pub struct CampaignPage {
    pub seo: PageSeo,
    pub campaign: CampaignView,
    pub updates: Vec<CampaignUpdate>,
}

#[derive(Debug, Serialize)]
pub struct DonatePage {
    pub seo: PageSeo,
    pub sections: Sections,
    pub campaigns: Vec<CampaignView>,
}

#[derive(Debug, Serialize)]
pub struct ContactPage {
    pub seo: PageSeo,
    pub sections: Sections,
    pub contact_info: ContactInfo,
    pub social_links: SocialLinks,
}

#[derive(Debug, Serialize)]
pub struct MentorshipPage {
    pub seo: PageSeo,
    pub sections: Sections,
    pub testimonials: Vec<Testimonial>,
}

const FEATURED_ON_HOME: i64 = 3;

fn to_json<T: Serialize>(page: &T) -> Option<Value> {
    match serde_json::to_value(page) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize page");
            None
        }
    }
}

#[derive(Clone)]
pub struct Pages {
    cms: Cms,
    cache: Arc<PageCache>,
}

impl Pages {
    pub fn new(cms: Cms, cache: Arc<PageCache>) -> Self {
        Self { cms, cache }
    }

    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    /// Serves `path` from the cache or builds and stores it. `None` results
    /// (not found) and pages built from a failed read are never cached.
    async fn cached<T, F, Fut>(&self, path: &str, language: Language, build: F) -> Option<Value>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        if let Some(hit) = self.cache.get(path, language).await {
            tracing::debug!(path, %language, "page cache hit");
            return Some(hit);
        }
        let (page, degraded) = track_degraded(build()).await;
        let value = to_json(&page?)?;
        if degraded {
            tracing::warn!(path, %language, "serving degraded page without caching it");
        } else {
            self.cache.put(path, language, value.clone()).await;
        }
        Some(value)
    }

    pub async fn home(&self, language: Language) -> Value {
        self.cached("/", language, || async move {
            let lang = language.code();
            let featured = CampaignQuery {
                featured: Some(true),
                limit: Some(FEATURED_ON_HOME),
                ..Default::default()
            };
            let (seo, sections, featured_campaigns, testimonials, hero_stats) = tokio::join!(
                self.cms.get_page_seo("/", language),
                self.cms.get_sections(&["hero", "mission", "impact"], lang),
                self.cms.get_campaigns(lang, &featured),
                self.cms.get_testimonials(),
                self.cms.hero_stats(),
            );
            Some(HomePage {
                seo,
                sections,
                featured_campaigns,
                testimonials,
                hero_stats,
            })
        })
        .await
        .unwrap_or_default()
    }

    pub async fn about(&self, language: Language) -> Value {
        self.cached("/about", language, || async move {
            let (seo, sections) = tokio::join!(
                self.cms.get_page_seo("/about", language),
                self.cms.get_sections(
                    &["mission", "values", "story", "team", "impact"],
                    language.code()
                ),
            );
            Some(AboutPage { seo, sections })
        })
        .await
        .unwrap_or_default()
    }

    pub async fn campaigns(&self, language: Language) -> Value {
        self.cached("/campaigns", language, || async move {
            let active = CampaignQuery::default();
            let (seo, campaigns) = tokio::join!(
                self.cms.get_page_seo("/campaigns", language),
                self.cms.get_campaigns(language.code(), &active),
            );
            Some(CampaignsPage { seo, campaigns })
        })
        .await
        .unwrap_or_default()
    }

    /// A campaign by id or slug. Unknown and draft campaigns are `None`.
    pub async fn campaign(&self, identifier: &str, language: Language) -> Option<Value> {
        let path = format!("/campaigns/{}", identifier);
        self.cached(&path, language, || async move {
            let campaign = self
                .cms
                .get_campaign(identifier, language.code())
                .await
                .filter(|c| c.status != "draft")?;

            let defaults = SeoDefaults {
                title: Some(campaign.title.clone()),
                description: Some(campaign.story.clone()),
                image: campaign.image.clone(),
            };
            let canonical = format!("/campaigns/{}", campaign.slug);
            let (seo, updates) = tokio::join!(
                self.cms.get_page_seo_with(&canonical, language, defaults),
                self.cms.get_campaign_updates(campaign.id),
            );
            Some(CampaignPage {
                seo,
                campaign,
                updates,
            })
        })
        .await
    }

    pub async fn donate(&self, language: Language) -> Value {
        self.cached("/donate", language, || async move {
            let active = CampaignQuery::default();
            let (seo, sections, campaigns) = tokio::join!(
                self.cms.get_page_seo("/donate", language),
                self.cms.get_sections(&["donate_info", "faq"], language.code()),
                self.cms.get_campaigns(language.code(), &active),
            );
            Some(DonatePage {
                seo,
                sections,
                campaigns,
            })
        })
        .await
        .unwrap_or_default()
    }

    pub async fn contact(&self, language: Language) -> Value {
        self.cached("/contact", language, || async move {
            let (seo, sections, contact_info, social_links) = tokio::join!(
                self.cms.get_page_seo("/contact", language),
                self.cms.get_sections(&["contact_info", "faq"], language.code()),
                self.cms.contact_info(),
                self.cms.social_links(),
            );
            Some(ContactPage {
                seo,
                sections,
                contact_info,
                social_links,
            })
        })
        .await
        .unwrap_or_default()
    }

    pub async fn mentorship(&self, language: Language) -> Value {
        self.cached("/mentorship", language, || async move {
            let (seo, sections, testimonials) = tokio::join!(
                self.cms.get_page_seo("/mentorship", language),
                self.cms.get_sections(&["mentorship", "faq"], language.code()),
                self.cms.get_testimonials(),
            );
            Some(MentorshipPage {
                seo,
                sections,
                testimonials,
            })
        })
        .await
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::campaigns::tests::create;
    use crate::cms::testing::{fixture, Fixture};
    use serde_json::json;

    fn pages(fx: &Fixture) -> Pages {
        Pages::new(fx.cms.clone(), fx.cache.clone())
    }

    async fn seed_hero(fx: &Fixture, lang: Language, headline: &str) {
        fx.cms
            .upsert_section_content(
                &fx.admin,
                "hero",
                lang,
                json!({ "title": headline, "subtitle": "Every child deserves a chance" }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_home_falls_back_to_english_sections() {
        let fx = fixture().await;
        seed_hero(&fx, Language::En, "Hope for every child").await;

        let page = pages(&fx).home(Language::Fr).await;
        assert_eq!(
            page["sections"]["hero"]["content"]["title"],
            "Hope for every child"
        );
        assert_eq!(page["seo"]["open_graph"]["locale"], "fr_FR");
        assert!(page["sections"].get("mission").is_none());
    }

    #[tokio::test]
    async fn test_home_is_cached_until_revalidated() {
        let fx = fixture().await;
        let pages = pages(&fx);
        seed_hero(&fx, Language::En, "First").await;
        assert_eq!(
            pages.home(Language::En).await["sections"]["hero"]["content"]["title"],
            "First"
        );

        // A write through the Cms revalidates "/".
        seed_hero(&fx, Language::En, "Second").await;
        assert_eq!(
            pages.home(Language::En).await["sections"]["hero"]["content"]["title"],
            "Second"
        );
    }

    #[tokio::test]
    async fn test_deleting_metadata_refreshes_page() {
        let fx = fixture().await;
        let pages = pages(&fx);
        let row = fx
            .cms
            .upsert_page_metadata(
                &fx.admin,
                crate::db::models::PageMetadataInput {
                    page_path: "/about".to_string(),
                    language_code: "en".to_string(),
                    title: Some("Custom About".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            pages.about(Language::En).await["seo"]["title"],
            "Custom About | Hope Foundation"
        );

        fx.cms.delete_page_metadata(&fx.admin, row.id).await.unwrap();
        assert_eq!(
            pages.about(Language::En).await["seo"]["title"],
            "About Us | Hope Foundation"
        );
    }

    #[tokio::test]
    async fn test_campaign_detail_hides_drafts_and_unknowns() {
        let fx = fixture().await;
        create(&fx, "hidden-draft", "draft").await;
        create(&fx, "school-books", "active").await;
        let pages = pages(&fx);

        assert!(pages.campaign("hidden-draft", Language::En).await.is_none());
        assert!(pages.campaign("no-such-campaign", Language::En).await.is_none());

        let page = pages.campaign("school-books", Language::En).await.unwrap();
        assert_eq!(page["campaign"]["slug"], "school-books");
        assert_eq!(page["seo"]["title"], "school-books | Hope Foundation");
        assert_eq!(
            page["seo"]["canonical"],
            "https://example.org/campaigns/school-books"
        );
    }

    #[tokio::test]
    async fn test_campaigns_page_lists_active_only() {
        let fx = fixture().await;
        create(&fx, "draft-one", "draft").await;
        create(&fx, "live-one", "active").await;

        let page = pages(&fx).campaigns(Language::En).await;
        let campaigns = page["campaigns"].as_array().unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0]["slug"], "live-one");
    }

    #[tokio::test]
    async fn test_backend_failure_renders_empty_page() {
        let fx = fixture().await;
        fx.store.set_failing(true);
        let page = pages(&fx).donate(Language::Zh).await;
        assert_eq!(page["campaigns"], json!([]));
        assert_eq!(page["seo"]["title"], "Donate | Hope Foundation");
    }

    #[tokio::test]
    async fn test_page_recovers_once_backend_is_back() {
        let fx = fixture().await;
        create(&fx, "clean-water", "active").await;
        let pages = pages(&fx);

        fx.store.set_failing(true);
        assert_eq!(pages.donate(Language::En).await["campaigns"], json!([]));
        assert!(fx.cache.is_empty().await);

        fx.store.set_failing(false);
        let page = pages.donate(Language::En).await;
        assert_eq!(page["campaigns"].as_array().unwrap().len(), 1);
        assert_eq!(fx.cache.len().await, 1);
    }
}
