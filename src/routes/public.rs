/**
 * Public Routes
 * Page view models and the read-only content API
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::cms::campaigns::CampaignQuery;
use crate::cms::sections::SectionDocument;
use crate::i18n::RequestLanguage;
use crate::routes::{failure, ok};
use crate::AppState;

/// Query parameters for GET /api/campaigns
#[derive(Debug, Deserialize)]
pub struct CampaignListQuery {
    pub featured: Option<bool>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

impl CampaignListQuery {
    /// Drafts are never listed publicly.
    fn into_query(self) -> CampaignQuery {
        let status = self
            .status
            .filter(|s| s == "active" || s == "completed");
        CampaignQuery {
            featured: self.featured,
            limit: self.limit.map(|l| l.clamp(1, 100)),
            status,
            admin: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

// ============================================================================
// Pages
// ============================================================================

/// GET /api/pages/home
pub async fn home_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    ok(state.pages.home(lang).await)
}

/// GET /api/pages/about
pub async fn about_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    ok(state.pages.about(lang).await)
}

/// GET /api/pages/campaigns
pub async fn campaigns_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    ok(state.pages.campaigns(lang).await)
}

/// GET /api/pages/campaigns/{identifier}
pub async fn campaign_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    match state.pages.campaign(&identifier, lang).await {
        Some(page) => ok(page),
        None => failure(StatusCode::NOT_FOUND, "Campaign not found"),
    }
}

/// GET /api/pages/donate
pub async fn donate_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    ok(state.pages.donate(lang).await)
}

/// GET /api/pages/contact
pub async fn contact_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    ok(state.pages.contact(lang).await)
}

/// GET /api/pages/mentorship
pub async fn mentorship_page(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    ok(state.pages.mentorship(lang).await)
}

// ============================================================================
// Content API
// ============================================================================

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<CampaignListQuery>,
) -> impl IntoResponse {
    ok(state
        .cms
        .get_campaigns(lang.code(), &query.into_query())
        .await)
}

/// GET /api/campaigns/{identifier}
pub async fn get_campaign(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    match state
        .cms
        .get_campaign(&identifier, lang.code())
        .await
        .filter(|c| c.status != "draft")
    {
        Some(campaign) => ok(campaign),
        None => failure(StatusCode::NOT_FOUND, "Campaign not found"),
    }
}

/// GET /api/content/{section}
pub async fn get_section(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Path(section): Path<String>,
) -> impl IntoResponse {
    if !SectionDocument::KEYS.contains(&section.as_str()) {
        return failure(StatusCode::NOT_FOUND, "Unknown section");
    }
    match state.cms.get_section_content(&section, lang.code()).await {
        Some(doc) => match doc.content() {
            Ok(content) => ok(content),
            Err(e) => {
                tracing::error!(section = %section, error = %e, "failed to encode section");
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load content")
            }
        },
        None => failure(StatusCode::NOT_FOUND, "Content not found"),
    }
}

/// GET /api/testimonials
pub async fn list_testimonials(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.cms.get_testimonials().await)
}

/// GET /api/metadata?path=/about
pub async fn get_metadata(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<MetadataQuery>,
) -> impl IntoResponse {
    ok(state.cms.get_page_seo(&query.path, lang).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::campaigns::tests::create;
    use crate::i18n::Language;
    use crate::routes::testing::{get_json, test_app};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    #[tokio::test]
    async fn test_home_page_uses_language_cookie() {
        let t = test_app().await;
        t.fx.cms
            .upsert_section_content(
                &t.fx.admin,
                "hero",
                Language::Fr,
                json!({ "title": "Bienvenue", "subtitle": "Ensemble" }),
            )
            .await
            .unwrap();

        let req = Request::get("/api/pages/home")
            .header("cookie", "lang=fr")
            .body(Body::empty())
            .unwrap();
        let (status, bytes) = crate::routes::testing::send(&t.app, req).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["sections"]["hero"]["content"]["title"], "Bienvenue");
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_not_found() {
        let t = test_app().await;
        let (status, body) = get_json(&t.app, "/api/pages/campaigns/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (status, _) = get_json(&t.app, "/api/campaigns/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_draft_status_cannot_be_listed_publicly() {
        let t = test_app().await;
        create(&t.fx, "secret-draft", "draft").await;
        create(&t.fx, "public-one", "active").await;

        let (_, body) = get_json(&t.app, "/api/campaigns?status=draft", None).await;
        let slugs: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["slug"].as_str())
            .collect();
        assert_eq!(slugs, vec!["public-one"]);

        let (status, _) = get_json(&t.app, "/api/campaigns/secret-draft", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_section_endpoint() {
        let t = test_app().await;
        let (status, _) = get_json(&t.app, "/api/content/sidebar", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(&t.app, "/api/content/hero", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        t.fx.cms
            .upsert_section_content(
                &t.fx.admin,
                "hero",
                Language::En,
                json!({ "title": "Hope", "subtitle": "For all" }),
            )
            .await
            .unwrap();
        let (status, body) = get_json(&t.app, "/api/content/hero?lang=zh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "Hope");
    }

    #[tokio::test]
    async fn test_metadata_endpoint_defaults() {
        let t = test_app().await;
        let (status, body) = get_json(&t.app, "/api/metadata?path=/contact", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "Contact | Hope Foundation");
    }
}
