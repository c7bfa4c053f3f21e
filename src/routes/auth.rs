/**
 * Authentication Routes
 * Session login/logout backed by the identity store, and the caller extractor
 */
use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, convert::Infallible, net::SocketAddr};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cms::Caller;
use crate::AppState;

// ============================================================================
// Configuration
// ============================================================================

/// HttpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Session lifetime in hours
const SESSION_EXPIRY_HOURS: i64 = 12;

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // Identity ID
    pub email: String, // Identity email
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<SessionUser>,
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    fn failed(status: StatusCode, error: &str) -> (StatusCode, Json<LoginResponse>) {
        (
            status,
            Json(LoginResponse {
                success: false,
                user: None,
                token: None,
                error: Some(error.to_string()),
            }),
        )
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// ============================================================================
// Tokens
// ============================================================================

pub fn create_session_token(
    secret: &str,
    identity: Uuid,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(SESSION_EXPIRY_HOURS);

    let claims = Claims {
        sub: identity.to_string(),
        email: email.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_session_token(
    secret: &str,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Resolves the caller from a bearer token or the session cookie. Missing or
/// invalid tokens make an anonymous caller.
pub fn caller_from_headers(secret: &str, headers: &HeaderMap) -> Caller {
    let token = extract_bearer_token(headers).or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
    });
    let Some(token) = token else {
        return Caller::anonymous();
    };

    match verify_session_token(secret, &token) {
        Ok(claims) => match Uuid::parse_str(&claims.sub) {
            Ok(identity) => Caller::identified(identity),
            Err(_) => Caller::anonymous(),
        },
        Err(e) => {
            tracing::debug!("Session token rejected: {}", e);
            Caller::anonymous()
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(caller_from_headers(&state.config.jwt_secret, &parts.headers))
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

/// At most one login attempt per IP per window.
pub struct LoginRateLimiter {
    window_secs: i64,
    attempts: RwLock<HashMap<String, i64>>,
}

impl LoginRateLimiter {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Records an attempt; false when the IP is still inside its window.
    ///
    /// Expired entries are evicted on every call so the map only holds
    /// active IPs.
    pub async fn check(&self, ip: &str) -> bool {
        if self.window_secs <= 0 {
            return true;
        }
        let now = Utc::now().timestamp();
        let mut attempts = self.attempts.write().await;

        attempts.retain(|_, last| now - *last < self.window_secs);

        if attempts.contains_key(ip) {
            return false;
        }

        attempts.insert(ip.to_string(), now);
        true
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
/// Verify credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();

    if !state.limiter.check(&ip).await {
        return (
            jar,
            LoginResponse::failed(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            ),
        );
    }

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return (
            jar,
            LoginResponse::failed(StatusCode::BAD_REQUEST, "Email and password are required"),
        );
    }

    if !payload.email.contains('@') {
        return (
            jar,
            LoginResponse::failed(StatusCode::BAD_REQUEST, "Invalid email format"),
        );
    }

    let identity = match state.identities.find_identity_by_email(payload.email.trim()).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::warn!(email = %payload.email, "login attempt for unknown identity");
            return (
                jar,
                LoginResponse::failed(StatusCode::UNAUTHORIZED, "Invalid credentials"),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "identity lookup failed during login");
            return (
                jar,
                LoginResponse::failed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication service temporarily unavailable.",
                ),
            );
        }
    };

    // bcrypt is CPU-bound; keep the async executor free.
    let password = payload.password;
    let hash = identity.password_hash.clone();
    let password_ok = tokio::task::spawn_blocking(move || verify(&password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false);
    if !password_ok {
        tracing::warn!(email = %identity.email, "failed login attempt");
        return (
            jar,
            LoginResponse::failed(StatusCode::UNAUTHORIZED, "Invalid credentials"),
        );
    }

    let token = match create_session_token(&state.config.jwt_secret, identity.id, &identity.email)
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "failed to create session token");
            return (
                jar,
                LoginResponse::failed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to create session",
                ),
            );
        }
    };

    state.cms.record_login(identity.id).await;
    tracing::info!(identity = %identity.id, "successful login");

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.is_production());

    (
        jar.add(cookie),
        (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                user: Some(SessionUser {
                    id: identity.id,
                    email: identity.email,
                }),
                token: Some(token),
                error: None,
            }),
        ),
    )
}

/// POST /api/auth/logout
/// Clears the session cookie. Always succeeds.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        (StatusCode::OK, Json(LogoutResponse { success: true })),
    )
}

/// GET /api/auth/me
/// The admin gate result for the current caller.
pub async fn me(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    (StatusCode::OK, Json(state.cms.check_admin_auth(&caller).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{AdminAuth, NOT_AN_ADMIN, NOT_AUTHENTICATED};
    use crate::routes::testing::{get_json, send_json, test_app};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn seed_login(app: &crate::routes::testing::TestApp, email: &str, password: &str) -> Uuid {
        let hash = bcrypt::hash(password, 4).unwrap();
        app.fx.store.seed_identity(email, &hash).await
    }

    #[test]
    fn test_verify_session_token_invalid_returns_err() {
        assert!(verify_session_token("secret", "invalid.jwt.token").is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_anonymous() {
        let token = create_session_token("other", Uuid::new_v4(), "a@b.org").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {}", token).parse().unwrap());
        assert_eq!(caller_from_headers("secret", &headers), Caller::anonymous());
    }

    #[test]
    fn test_session_cookie_identifies_caller() {
        let id = Uuid::new_v4();
        let token = create_session_token("secret", id, "a@b.org").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("cookie", format!("session={}", token).parse().unwrap());
        assert_eq!(caller_from_headers("secret", &headers), Caller::identified(id));
    }

    #[tokio::test]
    async fn test_rate_limiter_blocks_second_attempt() {
        let limiter = LoginRateLimiter::new(60);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);

        let disabled = LoginRateLimiter::new(0);
        assert!(disabled.check("10.0.0.1").await);
        assert!(disabled.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_login_empty_email_returns_bad_request() {
        let t = test_app().await;
        let (status, _) = send_json(
            &t.app,
            "POST",
            "/api/auth/login",
            None,
            &LoginRequest {
                email: "".to_string(),
                password: "secret-password".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_wrong_password_returns_unauthorized() {
        let t = test_app().await;
        seed_login(&t, "editor@example.org", "correct-horse").await;
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/auth/login",
            None,
            &LoginRequest {
                email: "editor@example.org".to_string(),
                password: "wrong".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let t = test_app().await;
        let id = seed_login(&t, "editor@example.org", "correct-horse").await;

        let req = Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&LoginRequest {
                    email: "Editor@Example.org".to_string(),
                    password: "correct-horse".to_string(),
                })
                .unwrap(),
            ))
            .unwrap();
        let res = t.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: LoginResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.success);
        assert_eq!(body.user.unwrap().id, id);
        let claims = verify_session_token(&t.state.config.jwt_secret, &body.token.unwrap()).unwrap();
        assert_eq!(claims.sub, id.to_string());
    }

    #[tokio::test]
    async fn test_me_reports_gate_result() {
        let t = test_app().await;

        let (_, body) = get_json(&t.app, "/api/auth/me", None).await;
        let auth: AdminAuth = serde_json::from_value(body).unwrap();
        assert_eq!(auth.error.as_deref(), Some(NOT_AUTHENTICATED));

        let (_, body) = get_json(&t.app, "/api/auth/me", Some(&t.visitor_token)).await;
        let auth: AdminAuth = serde_json::from_value(body).unwrap();
        assert_eq!(auth.error.as_deref(), Some(NOT_AN_ADMIN));

        let (status, body) = get_json(&t.app, "/api/auth/me", Some(&t.admin_token)).await;
        assert_eq!(status, StatusCode::OK);
        let auth: AdminAuth = serde_json::from_value(body).unwrap();
        assert_eq!(auth.user.unwrap().role, "admin");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let t = test_app().await;
        let req = Request::post("/api/auth/logout")
            .header("cookie", format!("session={}", t.admin_token))
            .body(Body::empty())
            .unwrap();
        let res = t.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("session="));
    }
}
