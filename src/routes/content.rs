/**
 * Content Admin Routes
 * Section translations, page metadata and site settings
 */
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cms::{ActionError, Caller};
use crate::db::models::PageMetadataInput;
use crate::i18n::Language;
use crate::routes::{ok, respond};
use crate::AppState;

/// Request body for PUT /api/admin/settings/{key}
#[derive(Debug, Deserialize)]
pub struct SettingRequest {
    pub value: Value,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Sections
// ============================================================================

/// GET /api/admin/sections
pub async fn list_sections(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    ok(state.cms.list_sections(&caller).await)
}

/// GET /api/admin/sections/{key}/translations
pub async fn list_section_translations(
    State(state): State<AppState>,
    caller: Caller,
    Path(key): Path<String>,
) -> impl IntoResponse {
    ok(state.cms.list_section_translations(&caller, &key).await)
}

/// PUT /api/admin/sections/{key}/{lang} - Replaces the whole document
pub async fn upsert_section(
    State(state): State<AppState>,
    caller: Caller,
    Path((key, lang)): Path<(String, String)>,
    Json(content): Json<Value>,
) -> impl IntoResponse {
    let language: Language = match lang.parse() {
        Ok(language) => language,
        Err(e) => return ActionError::validation(format!("{}", e)).into_response(),
    };
    respond(
        state
            .cms
            .upsert_section_content(&caller, &key, language, content)
            .await,
    )
}

// ============================================================================
// Page metadata
// ============================================================================

/// GET /api/admin/metadata
pub async fn list_metadata(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    ok(state.cms.list_page_metadata(&caller).await)
}

/// PUT /api/admin/metadata - Upsert by (page_path, language_code)
pub async fn upsert_metadata(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<PageMetadataInput>,
) -> impl IntoResponse {
    respond(state.cms.upsert_page_metadata(&caller, payload).await)
}

/// DELETE /api/admin/metadata/{id}
pub async fn delete_metadata(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    respond(state.cms.delete_page_metadata(&caller, id).await)
}

// ============================================================================
// Settings
// ============================================================================

/// GET /api/admin/settings
pub async fn list_settings(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    ok(state.cms.list_settings(&caller).await)
}

/// PUT /api/admin/settings/{key}
pub async fn upsert_setting(
    State(state): State<AppState>,
    caller: Caller,
    Path(key): Path<String>,
    Json(payload): Json<SettingRequest>,
) -> impl IntoResponse {
    respond(
        state
            .cms
            .upsert_setting(&caller, &key, payload.value, payload.description.as_deref())
            .await,
    )
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{get_json, send_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_section_upsert_validates_shape() {
        let t = test_app().await;
        let (status, _) = send_json(
            &t.app,
            "PUT",
            "/api/admin/sections/hero/fr",
            Some(&t.admin_token),
            &json!({ "headline": "wrong field" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &t.app,
            "PUT",
            "/api/admin/sections/hero/fr",
            Some(&t.admin_token),
            &json!({ "title": "Espoir", "subtitle": "Pour tous" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["language_code"], "fr");

        let (_, body) = get_json(
            &t.app,
            "/api/admin/sections/hero/translations",
            Some(&t.admin_token),
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let t = test_app().await;
        let (status, _) = send_json(
            &t.app,
            "PUT",
            "/api/admin/settings/social_links",
            Some(&t.admin_token),
            &json!({ "value": { "facebook": "https://facebook.com/hope" } }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&t.app, "/api/pages/contact", None).await;
        assert_eq!(
            body["data"]["social_links"]["facebook"],
            "https://facebook.com/hope"
        );
    }

    #[tokio::test]
    async fn test_metadata_upsert_changes_public_title() {
        let t = test_app().await;
        let (status, _) = send_json(
            &t.app,
            "PUT",
            "/api/admin/metadata",
            Some(&t.admin_token),
            &json!({ "page_path": "/donate", "language_code": "en", "title": "Give today" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&t.app, "/api/metadata?path=/donate", None).await;
        assert_eq!(body["data"]["title"], "Give today | Hope Foundation");
    }
}
