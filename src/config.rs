//! Application configuration, read from environment variables.

use std::time::Duration;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Request-scoped credential. `None` runs the site on the in-memory store.
    pub database_url: Option<String>,
    /// Privileged credential used only for admin-role lookups.
    pub admin_database_url: Option<String>,
    pub jwt_secret: String,
    pub site_url: String,
    pub site_name: String,
    pub upload_dir: String,
    pub public_storage_url: String,
    pub page_cache_ttl: Duration,
    pub donation_delay: Duration,
    pub donation_failure_rate: f64,
    pub login_rate_limit_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let admin_database_url = std::env::var("ADMIN_DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| database_url.clone());

        Self {
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "127.0.0.1"),
            port: env_parse("PORT", 3001),
            database_url,
            admin_database_url,
            jwt_secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
            site_url: env_or("SITE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            site_name: env_or("SITE_NAME", "Hope Foundation"),
            upload_dir: env_or("UPLOAD_DIR", "uploads"),
            public_storage_url: env_or("PUBLIC_STORAGE_URL", "/uploads")
                .trim_end_matches('/')
                .to_string(),
            page_cache_ttl: Duration::from_secs(env_parse("PAGE_CACHE_TTL_SECS", 300)),
            donation_delay: Duration::from_millis(env_parse("DONATION_DELAY_MS", 1500)),
            donation_failure_rate: env_parse("DONATION_FAILURE_RATE", 0.1_f64).clamp(0.0, 1.0),
            login_rate_limit_secs: env_parse("LOGIN_RATE_LIMIT_SECS", 2),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Configuration for tests and examples: in-memory store, no delays, no
    /// injected payment failures.
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: None,
            admin_database_url: None,
            jwt_secret: "test-secret".to_string(),
            site_url: "https://example.org".to_string(),
            site_name: "Hope Foundation".to_string(),
            upload_dir: "uploads".to_string(),
            public_storage_url: "/uploads".to_string(),
            page_cache_ttl: Duration::from_secs(60),
            donation_delay: Duration::ZERO,
            donation_failure_rate: 0.0,
            login_rate_limit_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_has_usable_defaults() {
        let config = AppConfig::from_env();
        assert!(!config.jwt_secret.is_empty());
        assert!(!config.site_url.ends_with('/'));
        assert!((0.0..=1.0).contains(&config.donation_failure_rate));
    }

    #[test]
    fn test_for_tests_disables_failures() {
        let config = AppConfig::for_tests();
        assert_eq!(config.donation_failure_rate, 0.0);
        assert!(config.database_url.is_none());
        assert!(!config.is_production());
    }
}
