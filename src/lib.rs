//! Nonprofit CMS - library for app logic and testing

pub mod cms;
pub mod config;
pub mod db;
pub mod donations;
pub mod i18n;
pub mod logging;
pub mod routes;
pub mod store;
pub mod views;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::cms::{Cms, PageCache, SiteInfo};
use crate::config::{AppConfig, DEFAULT_JWT_SECRET};
use crate::db::DbConfig;
use crate::donations::DonationProcessor;
use crate::routes::auth::LoginRateLimiter;
use crate::routes::media::UPLOAD_BODY_LIMIT;
use crate::store::{
    AdminDirectory, ContentStore, IdentityStore, LocalObjectStorage, MemoryStore,
    PgAdminDirectory, PgStore,
};
use crate::views::Pages;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub cms: Cms,
    pub pages: Pages,
    pub config: Arc<AppConfig>,
    pub identities: Arc<dyn IdentityStore>,
    pub limiter: Arc<LoginRateLimiter>,
    pub donations: DonationProcessor,
}

impl AppState {
    pub fn new(
        cms: Cms,
        cache: Arc<PageCache>,
        identities: Arc<dyn IdentityStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            pages: Pages::new(cms.clone(), cache),
            cms,
            identities,
            limiter: Arc::new(LoginRateLimiter::new(config.login_rate_limit_secs)),
            donations: DonationProcessor::new(config.donation_delay, config.donation_failure_rate),
            config: Arc::new(config),
        }
    }
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT_LANGUAGE,
        ])
        .allow_credentials(true)
}

fn public_routes() -> Router<AppState> {
    use routes::public;

    Router::new()
        .route("/api/pages/home", get(public::home_page))
        .route("/api/pages/about", get(public::about_page))
        .route("/api/pages/campaigns", get(public::campaigns_page))
        .route("/api/pages/campaigns/{identifier}", get(public::campaign_page))
        .route("/api/pages/donate", get(public::donate_page))
        .route("/api/pages/contact", get(public::contact_page))
        .route("/api/pages/mentorship", get(public::mentorship_page))
        .route("/api/campaigns", get(public::list_campaigns))
        .route("/api/campaigns/{identifier}", get(public::get_campaign))
        .route("/api/content/{section}", get(public::get_section))
        .route("/api/testimonials", get(public::list_testimonials))
        .route("/api/metadata", get(public::get_metadata))
        .route("/api/donate", post(routes::donate::submit_donation))
        .route("/api/logs", post(routes::logs::receive_client_logs))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/me", get(routes::auth::me))
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/ready", get(routes::health::health_ready))
}

/// Admin JSON API. Every handler runs the admin gate itself.
fn admin_api_routes() -> Router<AppState> {
    use routes::{admin, campaigns, content, media, testimonials};

    Router::new()
        .route(
            "/api/admin/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/api/admin/campaigns/{id}",
            patch(campaigns::update_campaign).delete(campaigns::delete_campaign),
        )
        .route(
            "/api/admin/campaigns/{id}/translations",
            get(campaigns::list_translations).put(campaigns::upsert_translation),
        )
        .route(
            "/api/admin/campaigns/{id}/translations/{lang}/copy",
            post(campaigns::copy_translation),
        )
        .route(
            "/api/admin/campaigns/{id}/images",
            get(campaigns::list_images).post(campaigns::add_image),
        )
        .route(
            "/api/admin/images/{id}",
            patch(campaigns::update_image).delete(campaigns::delete_image),
        )
        .route(
            "/api/admin/campaigns/{id}/updates",
            get(campaigns::list_updates).post(campaigns::add_update),
        )
        .route(
            "/api/admin/updates/{id}",
            axum::routing::delete(campaigns::delete_update),
        )
        .route(
            "/api/admin/testimonials",
            get(testimonials::list_testimonials).post(testimonials::create_testimonial),
        )
        .route(
            "/api/admin/testimonials/reorder",
            post(testimonials::reorder_testimonials),
        )
        .route(
            "/api/admin/testimonials/{id}",
            patch(testimonials::update_testimonial).delete(testimonials::delete_testimonial),
        )
        .route("/api/admin/sections", get(content::list_sections))
        .route(
            "/api/admin/sections/{key}/translations",
            get(content::list_section_translations),
        )
        .route("/api/admin/sections/{key}/{lang}", put(content::upsert_section))
        .route(
            "/api/admin/metadata",
            get(content::list_metadata).put(content::upsert_metadata),
        )
        .route(
            "/api/admin/metadata/{id}",
            axum::routing::delete(content::delete_metadata),
        )
        .route("/api/admin/settings", get(content::list_settings))
        .route("/api/admin/settings/{key}", put(content::upsert_setting))
        .route(
            "/api/admin/media",
            get(media::list_media)
                .post(media::upload_media)
                .delete(media::delete_media)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/admin/audit", get(admin::audit_log))
}

/// `/admin/*` pages behind the session guard, except the login page.
fn admin_page_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin", get(routes::admin::dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::admin::require_admin_session,
        ))
        .route(routes::admin::LOGIN_PATH, get(routes::admin::login_page))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    let mut app = Router::new()
        .merge(public_routes())
        .merge(admin_api_routes())
        .merge(admin_page_routes(&state));

    // Uploaded media is served from disk when the public URL is a local path.
    let public_storage_url = state.config.public_storage_url.clone();
    if public_storage_url.starts_with('/') && public_storage_url.len() > 1 {
        app = app.nest_service(
            &public_storage_url,
            ServeDir::new(&state.config.upload_dir),
        );
    }

    app.with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT))
        .layer(cors)
}

/// Backend ports chosen from configuration: Postgres when `DATABASE_URL` is
/// set, otherwise the in-memory store.
struct Backend {
    store: Arc<dyn ContentStore>,
    admins: Arc<dyn AdminDirectory>,
    identities: Arc<dyn IdentityStore>,
}

async fn connect_backend(config: &AppConfig) -> Result<Backend, BoxError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set. Running on the in-memory store.");
        let store = Arc::new(MemoryStore::new());
        seed_dev_admin(&store).await;
        return Ok(Backend {
            store: store.clone(),
            admins: store.clone(),
            identities: store,
        });
    };

    let pool = db::init_pool(&DbConfig::for_url(url)).await?;
    db::run_migrations(&pool).await?;

    let admin_pool = match config.admin_database_url.as_deref() {
        Some(admin_url) if admin_url != url => {
            db::init_pool(&DbConfig::for_url(admin_url)).await?
        }
        _ => pool.clone(),
    };
    let directory = Arc::new(PgAdminDirectory::new(admin_pool));

    Ok(Backend {
        store: Arc::new(PgStore::new(pool)),
        admins: directory.clone(),
        identities: directory,
    })
}

/// Lets a developer sign in to the in-memory store with
/// `ADMIN_EMAIL` + `ADMIN_HASH_PASSWORD` (see the `hash-password` binary).
async fn seed_dev_admin(store: &MemoryStore) {
    let (Ok(email), Ok(hash)) = (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_HASH_PASSWORD"),
    ) else {
        tracing::warn!("ADMIN_EMAIL / ADMIN_HASH_PASSWORD not set; no admin can sign in");
        return;
    };
    let id = store.seed_identity(&email, &hash).await;
    store.seed_admin(id, "admin", None).await;
    tracing::info!(email = %email, "seeded development admin");
}

/// Run the server (used by main).
pub async fn run() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    let _log_guards = logging::init(config.is_production());
    routes::health::init_start_time();

    if config.is_production() && config.jwt_secret == DEFAULT_JWT_SECRET {
        return Err("JWT_SECRET must be set to a secure, unique value in production".into());
    }

    let backend = connect_backend(&config).await?;
    let cache = Arc::new(PageCache::new(config.page_cache_ttl));
    let storage = Arc::new(LocalObjectStorage::new(
        &config.upload_dir,
        &config.public_storage_url,
    ));
    let cms = Cms::new(
        backend.store,
        backend.admins,
        storage,
        cache.clone(),
        SiteInfo {
            url: config.site_url.clone(),
            name: config.site_name.clone(),
        },
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(cms, cache, backend.identities, config);
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{get_json, send, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let t = test_app().await;
        let (status, _) = send(&t.app, Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let t = test_app().await;
        let res = tower::ServiceExt::oneshot(
            t.app.clone(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_public_and_admin_routers_are_merged() {
        let t = test_app().await;
        let (status, _) = get_json(&t.app, "/api/pages/home", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get_json(&t.app, "/api/admin/sections", Some(&t.admin_token)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
