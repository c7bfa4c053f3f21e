/**
 * Donation Route
 * Accepts the donation form and runs the simulated processor
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::donations::{DonationError, DonationRequest};
use crate::routes::{failure, ok};
use crate::AppState;

/// POST /api/donate
pub async fn submit_donation(
    State(state): State<AppState>,
    Json(payload): Json<DonationRequest>,
) -> impl IntoResponse {
    match state.donations.process(&payload).await {
        Ok(receipt) => ok(receipt),
        Err(DonationError::Validation(msg)) => failure(StatusCode::BAD_REQUEST, msg),
        Err(e @ DonationError::Processing) => failure(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{send_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_valid_donation_returns_reference() {
        let t = test_app().await;
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/donate",
            None,
            &json!({
                "amount": 50,
                "frequency": "once",
                "name": "Jo",
                "email": "jo@example.org"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["reference"].as_str().unwrap().starts_with("DON-"));
    }

    #[tokio::test]
    async fn test_out_of_range_amount_is_rejected() {
        let t = test_app().await;
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/donate",
            None,
            &json!({
                "amount": 250000,
                "frequency": "monthly",
                "name": "Jo",
                "email": "jo@example.org"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
