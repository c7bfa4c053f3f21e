/**
 * Campaign Admin Routes
 * Campaigns, their translations, images and progress updates
 */
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::cms::campaigns::CreateCampaign;
use crate::cms::{ActionError, Caller};
use crate::db::models::{
    CampaignChanges, CampaignImageChanges, CampaignTranslationInput, NewCampaignImage,
    NewCampaignUpdate,
};
use crate::i18n::{Language, RequestLanguage};
use crate::routes::{ok, respond, respond_created};
use crate::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AdminCampaignQuery {
    pub status: Option<String>,
}

/// Request body for POST /api/admin/campaigns/{id}/images
#[derive(Debug, Deserialize)]
pub struct AddImageRequest {
    pub image_url: String,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Request body for POST /api/admin/campaigns/{id}/updates
#[derive(Debug, Deserialize)]
pub struct AddUpdateRequest {
    pub update_date: Option<NaiveDate>,
    pub content: String,
}

// ============================================================================
// Campaigns
// ============================================================================

/// GET /api/admin/campaigns - Every status unless one is named
pub async fn list_campaigns(
    State(state): State<AppState>,
    caller: Caller,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<AdminCampaignQuery>,
) -> impl IntoResponse {
    ok(state
        .cms
        .admin_list_campaigns(&caller, lang.code(), query.status)
        .await)
}

/// POST /api/admin/campaigns - Create a campaign with its translations
pub async fn create_campaign(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateCampaign>,
) -> impl IntoResponse {
    respond_created(state.cms.create_campaign(&caller, payload).await)
}

/// PATCH /api/admin/campaigns/{id}
pub async fn update_campaign(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<CampaignChanges>,
) -> impl IntoResponse {
    respond(state.cms.update_campaign(&caller, id, payload).await)
}

/// DELETE /api/admin/campaigns/{id}
pub async fn delete_campaign(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    respond(state.cms.delete_campaign(&caller, id).await)
}

// ============================================================================
// Translations
// ============================================================================

/// GET /api/admin/campaigns/{id}/translations
pub async fn list_translations(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ok(state.cms.list_campaign_translations(&caller, id).await)
}

/// PUT /api/admin/campaigns/{id}/translations
pub async fn upsert_translation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<CampaignTranslationInput>,
) -> impl IntoResponse {
    respond(
        state
            .cms
            .upsert_campaign_translation(&caller, id, payload)
            .await,
    )
}

/// POST /api/admin/campaigns/{id}/translations/{lang}/copy - Copy from English
pub async fn copy_translation(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, lang)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let target: Language = match lang.parse() {
        Ok(target) => target,
        Err(e) => return ActionError::validation(format!("{}", e)).into_response(),
    };
    respond(
        state
            .cms
            .copy_translation_from_english(&caller, id, target)
            .await,
    )
}

// ============================================================================
// Images
// ============================================================================

/// GET /api/admin/campaigns/{id}/images
pub async fn list_images(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    ok(state.cms.list_campaign_images(id).await)
}

/// POST /api/admin/campaigns/{id}/images
pub async fn add_image(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddImageRequest>,
) -> impl IntoResponse {
    let image = NewCampaignImage {
        campaign_id: id,
        image_url: payload.image_url,
        image_alt: payload.image_alt,
        is_primary: payload.is_primary,
    };
    respond_created(state.cms.add_campaign_image(&caller, image).await)
}

/// PATCH /api/admin/images/{id}
pub async fn update_image(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<CampaignImageChanges>,
) -> impl IntoResponse {
    respond(state.cms.update_campaign_image(&caller, id, payload).await)
}

/// DELETE /api/admin/images/{id}
pub async fn delete_image(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    respond(state.cms.delete_campaign_image(&caller, id).await)
}

// ============================================================================
// Updates
// ============================================================================

/// GET /api/admin/campaigns/{id}/updates - Newest first
pub async fn list_updates(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    ok(state.cms.get_campaign_updates(id).await)
}

/// POST /api/admin/campaigns/{id}/updates - Dated today unless given
pub async fn add_update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddUpdateRequest>,
) -> impl IntoResponse {
    let update = NewCampaignUpdate {
        campaign_id: id,
        update_date: payload
            .update_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive()),
        content: payload.content,
    };
    respond_created(state.cms.add_campaign_update(&caller, update).await)
}

/// DELETE /api/admin/updates/{id}
pub async fn delete_update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    respond(state.cms.delete_campaign_update(&caller, id).await)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{get_json, send_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    fn campaign_body(slug: &str) -> serde_json::Value {
        json!({
            "slug": slug,
            "status": "active",
            "goal_amount": 10000,
            "translations": [
                { "language_code": "en", "title": "Clean water", "story": "Wells for a village" }
            ]
        })
    }

    #[tokio::test]
    async fn test_visitor_gets_tagged_unauthorized() {
        let t = test_app().await;
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/admin/campaigns",
            Some(&t.visitor_token),
            &campaign_body("clean-water"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn test_anonymous_listing_is_empty() {
        let t = test_app().await;
        crate::cms::campaigns::tests::create(&t.fx, "any", "draft").await;
        let (status, body) = get_json(&t.app, "/api/admin/campaigns", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_create_then_duplicate_slug_conflicts() {
        let t = test_app().await;
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/admin/campaigns",
            Some(&t.admin_token),
            &campaign_body("clean-water"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["slug"], "clean-water");

        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/admin/campaigns",
            Some(&t.admin_token),
            &campaign_body("clean-water"),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "A campaign with this slug already exists");
    }

    #[tokio::test]
    async fn test_primary_image_flow() {
        let t = test_app().await;
        let campaign = crate::cms::campaigns::tests::create(&t.fx, "books", "active").await;
        let uri = format!("/api/admin/campaigns/{}/images", campaign.id);
        for url in ["/uploads/a.jpg", "/uploads/b.jpg"] {
            let (status, _) = send_json(
                &t.app,
                "POST",
                &uri,
                Some(&t.admin_token),
                &json!({ "image_url": url, "is_primary": true }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = get_json(&t.app, &uri, None).await;
        let images = body["data"].as_array().unwrap();
        let primaries: Vec<&str> = images
            .iter()
            .filter(|i| i["is_primary"] == true)
            .filter_map(|i| i["image_url"].as_str())
            .collect();
        assert_eq!(primaries, vec!["/uploads/b.jpg"]);
    }

    #[tokio::test]
    async fn test_copy_translation_rejects_unknown_language() {
        let t = test_app().await;
        let campaign = crate::cms::campaigns::tests::create(&t.fx, "books", "active").await;
        let (status, _) = send_json(
            &t.app,
            "POST",
            &format!("/api/admin/campaigns/{}/translations/de/copy", campaign.id),
            Some(&t.admin_token),
            &json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &t.app,
            "POST",
            &format!("/api/admin/campaigns/{}/translations/fr/copy", campaign.id),
            Some(&t.admin_token),
            &json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["language_code"], "fr");
    }
}
