/**
 * Media Library Routes
 * Folder-scoped image upload, listing and deletion
 */
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::cms::media::MAX_FILE_SIZE;
use crate::cms::Caller;
use crate::routes::{failure, ok, respond, respond_created};
use crate::AppState;

/// Multipart overhead allowed on top of the file itself.
pub const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    #[serde(default = "default_folder")]
    pub folder: String,
}

fn default_folder() -> String {
    "content".to_string()
}

/// Request body for DELETE /api/admin/media
#[derive(Debug, Deserialize)]
pub struct DeleteMediaRequest {
    pub paths: Vec<String>,
}

/// GET /api/admin/media?folder=content
pub async fn list_media(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<MediaQuery>,
) -> impl IntoResponse {
    ok(state.cms.list_media(&caller, &query.folder).await)
}

/// POST /api/admin/media - multipart with a `folder` text field and a `file` field
pub async fn upload_media(
    State(state): State<AppState>,
    caller: Caller,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut folder = default_folder();
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart error: {}", e);
                return failure(StatusCode::BAD_REQUEST, "Invalid multipart data");
            }
        };

        match field.name() {
            Some("folder") => match field.text().await {
                Ok(text) => folder = text,
                Err(e) => {
                    tracing::error!("Failed to read folder field: {}", e);
                    return failure(StatusCode::BAD_REQUEST, "Invalid multipart data");
                }
            },
            Some("file") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((content_type, bytes.to_vec())),
                    Err(e) => {
                        tracing::error!("Failed to read upload bytes: {}", e);
                        return failure(StatusCode::BAD_REQUEST, "Failed to read file data");
                    }
                }
            }
            _ => {}
        }
    }

    let Some((content_type, bytes)) = file else {
        return failure(StatusCode::BAD_REQUEST, "No file provided");
    };

    respond_created(
        state
            .cms
            .upload_media(&caller, &folder, &content_type, &bytes)
            .await,
    )
}

/// DELETE /api/admin/media
pub async fn delete_media(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<DeleteMediaRequest>,
) -> impl IntoResponse {
    respond(state.cms.delete_media(&caller, &payload.paths).await)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{get_json, send, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(folder: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"folder\"\r\n\r\n{folder}\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"x\"\r\n\
                 Content-Type: {content_type}\r\n\r\n",
                b = BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
        Request::post("/api/admin/media")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_and_list() {
        let t = test_app().await;
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let req = upload_request(&t.admin_token, multipart_body("content", "image/jpeg", &jpeg));
        let (status, bytes) = send(&t.app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let path = body["data"]["path"].as_str().unwrap().to_string();
        assert!(t.fx.storage.contains(&path).await);

        let (_, body) = get_json(&t.app, "/api/admin/media?folder=content", Some(&t.admin_token)).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pdf_upload_is_rejected() {
        let t = test_app().await;
        let req = upload_request(
            &t.admin_token,
            multipart_body("content", "application/pdf", b"%PDF-1.4"),
        );
        let (status, _) = send(&t.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, body) = get_json(&t.app, "/api/admin/media", Some(&t.admin_token)).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }
}
