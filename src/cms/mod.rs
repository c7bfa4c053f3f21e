//! Data-access layer.
//!
//! [`Cms`] owns the injected ports and exposes one method per entity
//! operation. Public reads never fail: backend errors are logged and turned
//! into empty values. Admin listings return empty lists when the caller is not
//! an admin. Mutations check the admin gate first and return [`ActionError`].

pub mod audit;
pub mod cache;
pub mod campaigns;
pub mod images;
pub mod media;
pub mod metadata;
pub mod sections;
pub mod settings;
pub mod testimonials;
pub mod updates;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{AdminDirectory, ContentStore, ObjectStorage, StoreError};

pub use cache::{PageCache, Revalidator};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Backend(String),
}

impl ActionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => ActionError::Conflict(msg),
            other => {
                tracing::error!(error = %other, "backend write failed");
                ActionError::Backend("Database error".to_string())
            }
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

// ============================================================================
// Admin gate
// ============================================================================

/// Who is making the request, as established by the session layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    pub identity: Option<Uuid>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn identified(identity: Uuid) -> Self {
        Self {
            identity: Some(identity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub role: String,
    pub full_name: Option<String>,
}

/// Outcome of [`Cms::check_admin_auth`]: exactly one of the two is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAuth {
    pub user: Option<AdminProfile>,
    pub error: Option<String>,
}

impl AdminAuth {
    fn denied(error: &str) -> Self {
        Self {
            user: None,
            error: Some(error.to_string()),
        }
    }
}

pub const NOT_AUTHENTICATED: &str = "Not authenticated";
pub const NOT_AN_ADMIN: &str = "Not an admin user";

// ============================================================================
// Cms
// ============================================================================

/// Site identity used when building canonical URLs and SEO tags.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub url: String,
    pub name: String,
}

#[derive(Clone)]
pub struct Cms {
    store: Arc<dyn ContentStore>,
    admins: Arc<dyn AdminDirectory>,
    storage: Arc<dyn ObjectStorage>,
    revalidator: Arc<dyn Revalidator>,
    site: SiteInfo,
}

impl Cms {
    pub fn new(
        store: Arc<dyn ContentStore>,
        admins: Arc<dyn AdminDirectory>,
        storage: Arc<dyn ObjectStorage>,
        revalidator: Arc<dyn Revalidator>,
        site: SiteInfo,
    ) -> Self {
        Self {
            store,
            admins,
            storage,
            revalidator,
            site,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn site(&self) -> &SiteInfo {
        &self.site
    }

    /// Resolves the caller's admin profile through the privileged port.
    pub async fn check_admin_auth(&self, caller: &Caller) -> AdminAuth {
        let Some(identity) = caller.identity else {
            return AdminAuth::denied(NOT_AUTHENTICATED);
        };

        match self.admins.find_admin(identity).await {
            Ok(Some(admin)) => AdminAuth {
                user: Some(AdminProfile {
                    id: admin.id,
                    role: admin.role,
                    full_name: admin.full_name,
                }),
                error: None,
            },
            Ok(None) => AdminAuth::denied(NOT_AN_ADMIN),
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "admin lookup failed");
                AdminAuth::denied(NOT_AN_ADMIN)
            }
        }
    }

    /// Gate for mutations: the admin profile, or `Unauthorized`.
    pub async fn require_admin(&self, caller: &Caller) -> ActionResult<AdminProfile> {
        let auth = self.check_admin_auth(caller).await;
        match auth.user {
            Some(profile) => Ok(profile),
            None => {
                tracing::warn!(
                    identity = ?caller.identity,
                    reason = auth.error.as_deref().unwrap_or_default(),
                    "admin action rejected"
                );
                Err(ActionError::Unauthorized)
            }
        }
    }

    /// Gate for admin listings: `None` means "return an empty list".
    async fn admin_or_none(&self, caller: &Caller) -> Option<AdminProfile> {
        self.check_admin_auth(caller).await.user
    }

    /// Records a successful login on the admin record.
    pub async fn record_login(&self, identity: Uuid) {
        if let Err(e) = self.admins.record_login(identity).await {
            tracing::warn!(identity = %identity, error = %e, "failed to record admin login");
        }
    }

    async fn revalidate(&self, paths: &[&str]) {
        for path in paths {
            self.revalidator.revalidate(path).await;
        }
    }
}
