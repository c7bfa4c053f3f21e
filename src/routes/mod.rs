/**
 * Routes Module
 * HTTP handlers and the shared response envelope
 */
pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod content;
pub mod donate;
pub mod health;
pub mod logs;
pub mod media;
pub mod public;
pub mod testimonials;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::cms::{ActionError, ActionResult};

/// `{ "success": true, "data": ... }` or `{ "success": false, "error": "..." }`
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

pub fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(Envelope::<()> {
            success: false,
            data: None,
            error: Some(error.into()),
        }),
    )
        .into_response()
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = match &self {
            ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
            ActionError::Validation(_) => StatusCode::BAD_REQUEST,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::Conflict(_) => StatusCode::CONFLICT,
            ActionError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        failure(status, self.to_string())
    }
}

/// Renders a mutation result.
pub fn respond<T: Serialize>(result: ActionResult<T>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(e) => e.into_response(),
    }
}

/// Like [`respond`], with `201 Created` on success.
pub fn respond_created<T: Serialize>(result: ActionResult<T>) -> Response {
    match result {
        Ok(data) => created(data),
        Err(e) => e.into_response(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_errors_map_to_status_codes() {
        let cases = [
            (ActionError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ActionError::validation("bad"), StatusCode::BAD_REQUEST),
            (ActionError::not_found("gone"), StatusCode::NOT_FOUND),
            (ActionError::Conflict("taken".into()), StatusCode::CONFLICT),
            (ActionError::Backend("db".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let json = serde_json::to_value(Envelope::<()> {
            success: false,
            data: None,
            error: Some("Unauthorized".to_string()),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "Unauthorized" }));
    }
}
