/**
 * Testimonial Admin Routes
 */
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::cms::Caller;
use crate::db::models::{NewTestimonial, TestimonialChanges};
use crate::routes::{ok, respond, respond_created};
use crate::AppState;

/// Request body for POST /api/admin/testimonials/reorder
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

/// GET /api/admin/testimonials - Active and inactive, in display order
pub async fn list_testimonials(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    ok(state.cms.list_all_testimonials(&caller).await)
}

/// POST /api/admin/testimonials
pub async fn create_testimonial(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<NewTestimonial>,
) -> impl IntoResponse {
    respond_created(state.cms.create_testimonial(&caller, payload).await)
}

/// PATCH /api/admin/testimonials/{id}
pub async fn update_testimonial(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<TestimonialChanges>,
) -> impl IntoResponse {
    respond(state.cms.update_testimonial(&caller, id, payload).await)
}

/// DELETE /api/admin/testimonials/{id}
pub async fn delete_testimonial(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    respond(state.cms.delete_testimonial(&caller, id).await)
}

/// POST /api/admin/testimonials/reorder - Positions follow the order of `ids`
pub async fn reorder_testimonials(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<ReorderRequest>,
) -> impl IntoResponse {
    respond(state.cms.reorder_testimonials(&caller, &payload.ids).await)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{get_json, send_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_reorder() {
        let t = test_app().await;
        let mut ids = Vec::new();
        for name in ["Amina Yusuf", "Ben Carter"] {
            let (status, body) = send_json(
                &t.app,
                "POST",
                "/api/admin/testimonials",
                Some(&t.admin_token),
                &json!({ "name": name, "role": "Mentor", "content": "Rewarding" }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let (status, _) = send_json(
            &t.app,
            "POST",
            "/api/admin/testimonials/reorder",
            Some(&t.admin_token),
            &json!({ "ids": [ids[1], ids[0]] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&t.app, "/api/testimonials", None).await;
        let names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Ben Carter", "Amina Yusuf"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_bad_request() {
        let t = test_app().await;
        let id = uuid::Uuid::new_v4();
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/admin/testimonials/reorder",
            Some(&t.admin_token),
            &json!({ "ids": [id, id] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
