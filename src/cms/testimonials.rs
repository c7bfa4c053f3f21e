//! Testimonials and their display order.

use std::collections::HashSet;

use uuid::Uuid;

use super::cache::mark_degraded;
use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::{NewTestimonial, Testimonial, TestimonialChanges};

/// Up to two initials from the first two words of a name: "Mary Jane Smith" -> "MJ".
pub fn derive_initials(name: &str) -> Option<String> {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    (!initials.is_empty()).then_some(initials)
}

fn require_text(value: &str, field: &str) -> ActionResult<()> {
    if value.trim().is_empty() {
        Err(ActionError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

impl Cms {
    /// Active testimonials in display order.
    pub async fn get_testimonials(&self) -> Vec<Testimonial> {
        self.store.list_testimonials(true).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to list testimonials");
            mark_degraded();
            Vec::new()
        })
    }

    pub async fn list_all_testimonials(&self, caller: &Caller) -> Vec<Testimonial> {
        if self.admin_or_none(caller).await.is_none() {
            return Vec::new();
        }
        self.store.list_testimonials(false).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to list testimonials");
            Vec::new()
        })
    }

    pub async fn create_testimonial(
        &self,
        caller: &Caller,
        input: NewTestimonial,
    ) -> ActionResult<Testimonial> {
        let admin = self.require_admin(caller).await?;
        require_text(&input.name, "Name")?;
        require_text(&input.role, "Role")?;
        require_text(&input.content, "Content")?;

        let avatar_initials = input
            .avatar_initials
            .filter(|i| !i.trim().is_empty())
            .or_else(|| derive_initials(&input.name));
        let input = NewTestimonial {
            avatar_initials,
            ..input
        };

        let row = self.store.insert_testimonial(admin.id, &input).await?;
        tracing::info!(testimonial = %row.id, order = row.display_order, "testimonial created");
        self.revalidate(&["/", "/mentorship"]).await;
        Ok(row)
    }

    /// Renaming re-derives the initials unless they are set explicitly.
    pub async fn update_testimonial(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: TestimonialChanges,
    ) -> ActionResult<Testimonial> {
        let admin = self.require_admin(caller).await?;
        for (value, field) in [
            (&changes.name, "Name"),
            (&changes.role, "Role"),
            (&changes.content, "Content"),
        ] {
            if let Some(value) = value {
                require_text(value, field)?;
            }
        }

        let mut changes = changes;
        if changes.avatar_initials.is_none() {
            if let Some(name) = &changes.name {
                changes.avatar_initials = Some(derive_initials(name));
            }
        }

        let row = self
            .store
            .update_testimonial(admin.id, id, &changes)
            .await?
            .ok_or_else(|| ActionError::not_found("Testimonial not found"))?;
        self.revalidate(&["/", "/mentorship"]).await;
        Ok(row)
    }

    pub async fn delete_testimonial(&self, caller: &Caller, id: Uuid) -> ActionResult<()> {
        let admin = self.require_admin(caller).await?;
        if !self.store.delete_testimonial(admin.id, id).await? {
            return Err(ActionError::not_found("Testimonial not found"));
        }
        self.revalidate(&["/", "/mentorship"]).await;
        Ok(())
    }

    /// Assigns `display_order = index` to each id in turn. Stops at the first
    /// failure; earlier assignments stay applied.
    pub async fn reorder_testimonials(&self, caller: &Caller, ids: &[Uuid]) -> ActionResult<()> {
        let admin = self.require_admin(caller).await?;

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ActionError::validation(format!(
                "Testimonial {} appears more than once",
                dup
            )));
        }

        for (index, id) in ids.iter().enumerate() {
            let order = i32::try_from(index)
                .map_err(|_| ActionError::validation("Too many testimonials"))?;
            match self.store.set_testimonial_order(admin.id, *id, order).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(testimonial = %id, applied = index, "reorder stopped");
                    self.revalidate(&["/", "/mentorship"]).await;
                    return Err(ActionError::not_found(format!("Testimonial {} not found", id)));
                }
                Err(e) => {
                    tracing::error!(testimonial = %id, applied = index, error = %e, "reorder failed");
                    self.revalidate(&["/", "/mentorship"]).await;
                    return Err(e.into());
                }
            }
        }

        tracing::info!(count = ids.len(), "testimonials reordered");
        self.revalidate(&["/", "/mentorship"]).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::testing::fixture;
    use crate::i18n::Language;

    fn testimonial(name: &str) -> NewTestimonial {
        NewTestimonial {
            name: name.to_string(),
            role: "Sponsor".to_string(),
            content: "Wonderful to see the progress.".to_string(),
            avatar_initials: None,
            is_active: true,
        }
    }

    #[test]
    fn test_derive_initials() {
        assert_eq!(derive_initials("Mary Jane Smith").as_deref(), Some("MJ"));
        assert_eq!(derive_initials("amani").as_deref(), Some("A"));
        assert_eq!(derive_initials("  "), None);
    }

    #[tokio::test]
    async fn test_create_appends_and_derives_initials() {
        let fx = fixture().await;
        let a = fx.cms.create_testimonial(&fx.admin, testimonial("Grace Otieno")).await.unwrap();
        let b = fx.cms.create_testimonial(&fx.admin, testimonial("Li Wei")).await.unwrap();
        assert_eq!(a.avatar_initials.as_deref(), Some("GO"));
        assert_eq!((a.display_order, b.display_order), (0, 1));
    }

    #[tokio::test]
    async fn test_reorder_assigns_dense_indices() {
        let fx = fixture().await;
        let mut ids = Vec::new();
        for name in ["One", "Two", "Three"] {
            ids.push(fx.cms.create_testimonial(&fx.admin, testimonial(name)).await.unwrap().id);
        }
        let wanted = vec![ids[2], ids[0], ids[1]];
        fx.cms.reorder_testimonials(&fx.admin, &wanted).await.unwrap();

        let listed = fx.cms.list_all_testimonials(&fx.admin).await;
        let order: Vec<(Uuid, i32)> = listed.iter().map(|t| (t.id, t.display_order)).collect();
        assert_eq!(order, vec![(ids[2], 0), (ids[0], 1), (ids[1], 2)]);
    }

    #[tokio::test]
    async fn test_reorder_rejects_duplicates_before_writing() {
        let fx = fixture().await;
        let a = fx.cms.create_testimonial(&fx.admin, testimonial("A")).await.unwrap();
        let b = fx.cms.create_testimonial(&fx.admin, testimonial("B")).await.unwrap();

        let err = fx
            .cms
            .reorder_testimonials(&fx.admin, &[b.id, a.id, b.id])
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));

        let listed = fx.cms.list_all_testimonials(&fx.admin).await;
        assert_eq!(listed[0].id, a.id);
    }

    #[tokio::test]
    async fn test_reorder_stops_at_first_missing_id() {
        let fx = fixture().await;
        let a = fx.cms.create_testimonial(&fx.admin, testimonial("A")).await.unwrap();
        let b = fx.cms.create_testimonial(&fx.admin, testimonial("B")).await.unwrap();

        let err = fx
            .cms
            .reorder_testimonials(&fx.admin, &[b.id, Uuid::new_v4(), a.id])
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));

        // b was moved to 0 before the failure; a kept its old position.
        let listed = fx.cms.list_all_testimonials(&fx.admin).await;
        let b_row = listed.iter().find(|t| t.id == b.id).unwrap();
        let a_row = listed.iter().find(|t| t.id == a.id).unwrap();
        assert_eq!(b_row.display_order, 0);
        assert_eq!(a_row.display_order, 0);
    }

    #[tokio::test]
    async fn test_partial_reorder_still_evicts_pages() {
        let fx = fixture().await;
        let a = fx.cms.create_testimonial(&fx.admin, testimonial("A")).await.unwrap();
        let b = fx.cms.create_testimonial(&fx.admin, testimonial("B")).await.unwrap();
        fx.cache
            .put("/mentorship", Language::En, serde_json::json!({ "stale": true }))
            .await;
        fx.cache
            .put("/", Language::En, serde_json::json!({ "stale": true }))
            .await;

        let err = fx
            .cms
            .reorder_testimonials(&fx.admin, &[b.id, Uuid::new_v4(), a.id])
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));

        assert!(fx.cache.get("/mentorship", Language::En).await.is_none());
        assert!(fx.cache.get("/", Language::En).await.is_none());
        let listed = fx.cms.list_all_testimonials(&fx.admin).await;
        assert_eq!(listed.iter().find(|t| t.id == b.id).unwrap().display_order, 0);
    }

    #[tokio::test]
    async fn test_public_list_hides_inactive() {
        let fx = fixture().await;
        let hidden = fx.cms.create_testimonial(&fx.admin, testimonial("Hidden")).await.unwrap();
        fx.cms.create_testimonial(&fx.admin, testimonial("Shown")).await.unwrap();
        fx.cms
            .update_testimonial(
                &fx.admin,
                hidden.id,
                TestimonialChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let public = fx.cms.get_testimonials().await;
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name, "Shown");
        assert_eq!(fx.cms.list_all_testimonials(&fx.admin).await.len(), 2);
    }

    #[tokio::test]
    async fn test_rename_rederives_initials() {
        let fx = fixture().await;
        let t = fx.cms.create_testimonial(&fx.admin, testimonial("Old Name")).await.unwrap();
        let updated = fx
            .cms
            .update_testimonial(
                &fx.admin,
                t.id,
                TestimonialChanges {
                    name: Some("Zara Kim".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.avatar_initials.as_deref(), Some("ZK"));
    }

    #[tokio::test]
    async fn test_visitor_cannot_reorder() {
        let fx = fixture().await;
        let err = fx.cms.reorder_testimonials(&fx.visitor, &[]).await.unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
        assert!(fx.cms.list_all_testimonials(&fx.visitor).await.is_empty());
    }
}
