//! Audit log viewer.

use super::{Caller, Cms};
use crate::db::models::{AuditFilter, AuditLogEntry};

impl Cms {
    /// Newest entries first, filtered by table and user.
    pub async fn get_audit_log(&self, caller: &Caller, filter: &AuditFilter) -> Vec<AuditLogEntry> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        self.store.list_audit_log(filter).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load audit log");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::campaigns::tests::create;
    use crate::cms::testing::fixture;
    use crate::db::models::NewTestimonial;

    #[tokio::test]
    async fn test_filters_by_table_and_user() {
        let fx = fixture().await;
        create(&fx, "audited", "active").await;
        fx.cms
            .create_testimonial(
                &fx.admin,
                NewTestimonial {
                    name: "Ana".to_string(),
                    role: "Parent".to_string(),
                    content: "Thank you".to_string(),
                    avatar_initials: None,
                    is_active: true,
                },
            )
            .await
            .unwrap();

        let campaigns = fx
            .cms
            .get_audit_log(
                &fx.admin,
                &AuditFilter {
                    table_name: Some("campaigns".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].user_id, fx.admin.identity);

        let everything = fx
            .cms
            .get_audit_log(
                &fx.admin,
                &AuditFilter {
                    user_id: fx.admin.identity,
                    ..Default::default()
                },
            )
            .await;
        // campaign + its translation + testimonial
        assert_eq!(everything.len(), 3);
        assert_eq!(everything[0].table_name, "testimonials");

        assert!(fx
            .cms
            .get_audit_log(&fx.visitor, &AuditFilter::default())
            .await
            .is_empty());
    }
}
