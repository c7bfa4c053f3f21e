/**
 * Admin Section Routes
 * Route guard, dashboard summary, login page and audit log
 */
use std::collections::BTreeMap;

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use serde::Serialize;

use crate::cms::{AdminProfile, Caller};
use crate::db::models::{AuditFilter, AuditLogEntry};
use crate::i18n::RequestLanguage;
use crate::routes::auth::caller_from_headers;
use crate::routes::ok;
use crate::AppState;

pub const LOGIN_PATH: &str = "/admin/login";
const RECENT_ACTIVITY_LIMIT: i64 = 10;

/// Guard for `/admin/*`: session lookup, then the privileged role lookup.
/// Anyone who fails either step is sent to the login page.
pub async fn require_admin_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let caller = caller_from_headers(&state.config.jwt_secret, request.headers());
    let auth = state.cms.check_admin_auth(&caller).await;

    match auth.user {
        Some(profile) => {
            request.extensions_mut().insert(profile);
            next.run(request).await
        }
        None => {
            tracing::debug!(
                path = %request.uri().path(),
                reason = auth.error.as_deref().unwrap_or_default(),
                "redirecting to admin login"
            );
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub admin: AdminProfile,
    pub total_campaigns: usize,
    pub campaigns_by_status: BTreeMap<String, usize>,
    pub testimonials: usize,
    pub recent_activity: Vec<AuditLogEntry>,
}

/// GET /admin - Dashboard summary
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminProfile>,
    caller: Caller,
    RequestLanguage(lang): RequestLanguage,
) -> impl IntoResponse {
    let recent = AuditFilter {
        limit: Some(RECENT_ACTIVITY_LIMIT),
        ..Default::default()
    };
    let (campaigns, testimonials, recent_activity) = tokio::join!(
        state.cms.admin_list_campaigns(&caller, lang.code(), None),
        state.cms.list_all_testimonials(&caller),
        state.cms.get_audit_log(&caller, &recent),
    );

    let mut campaigns_by_status = BTreeMap::new();
    for campaign in &campaigns {
        *campaigns_by_status
            .entry(campaign.status.clone())
            .or_insert(0) += 1;
    }

    ok(DashboardSummary {
        admin,
        total_campaigns: campaigns.len(),
        campaigns_by_status,
        testimonials: testimonials.len(),
        recent_activity,
    })
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Admin sign in</title>
</head>
<body>
<form id="login">
  <label>Email <input name="email" type="email" required></label>
  <label>Password <input name="password" type="password" required></label>
  <button type="submit">Sign in</button>
  <p id="error" role="alert"></p>
</form>
<script>
document.getElementById("login").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  const res = await fetch("/api/auth/login", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    credentials: "same-origin",
    body: JSON.stringify({ email: form.get("email"), password: form.get("password") }),
  });
  const body = await res.json();
  if (body.success) {
    window.location.href = "/admin";
  } else {
    document.getElementById("error").textContent = body.error || "Login failed";
  }
});
</script>
</body>
</html>
"#;

/// GET /admin/login
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// GET /api/admin/audit?table_name=&user_id=&limit=
pub async fn audit_log(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<AuditFilter>,
) -> impl IntoResponse {
    ok(state.cms.get_audit_log(&caller, &filter).await)
}
