//! Campaign images: single-primary and append ordering are kept by the store.

use uuid::Uuid;

use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::{CampaignImage, CampaignImageChanges, NewCampaignImage};
use crate::store::CampaignRef;

impl Cms {
    pub async fn list_campaign_images(&self, campaign_id: Uuid) -> Vec<CampaignImage> {
        self.store
            .list_campaign_images(&[campaign_id])
            .await
            .unwrap_or_else(|e| {
                tracing::error!(campaign = %campaign_id, error = %e, "failed to list images");
                Vec::new()
            })
    }

    pub(super) async fn revalidate_campaign(&self, campaign_id: Uuid) {
        match self.store.find_campaign(&CampaignRef::Id(campaign_id)).await {
            Ok(Some(campaign)) => {
                let detail = format!("/campaigns/{}", campaign.slug);
                self.revalidate(&["/", "/campaigns", detail.as_str()]).await;
            }
            _ => self.revalidate(&["/", "/campaigns"]).await,
        }
    }

    /// Appends an image; a primary image demotes the previous one.
    pub async fn add_campaign_image(
        &self,
        caller: &Caller,
        image: NewCampaignImage,
    ) -> ActionResult<CampaignImage> {
        let admin = self.require_admin(caller).await?;
        if image.image_url.trim().is_empty() {
            return Err(ActionError::validation("Image URL is required"));
        }

        let row = self
            .store
            .insert_campaign_image(admin.id, &image)
            .await
            .map_err(|e| match ActionError::from(e) {
                ActionError::Conflict(_) => ActionError::not_found("Campaign not found"),
                other => other,
            })?;

        tracing::info!(
            campaign = %row.campaign_id,
            image = %row.id,
            primary = row.is_primary,
            order = row.display_order,
            "campaign image added"
        );
        self.revalidate_campaign(row.campaign_id).await;
        Ok(row)
    }

    pub async fn update_campaign_image(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: CampaignImageChanges,
    ) -> ActionResult<CampaignImage> {
        let admin = self.require_admin(caller).await?;
        if changes.display_order.is_some_and(|o| o < 0) {
            return Err(ActionError::validation("Display order cannot be negative"));
        }

        let row = self
            .store
            .update_campaign_image(admin.id, id, &changes)
            .await?
            .ok_or_else(|| ActionError::not_found("Image not found"))?;

        self.revalidate_campaign(row.campaign_id).await;
        Ok(row)
    }

    /// Deletes the row, then tries to delete the blob behind its URL. A blob
    /// that cannot be removed is logged and left behind.
    pub async fn delete_campaign_image(&self, caller: &Caller, id: Uuid) -> ActionResult<()> {
        let admin = self.require_admin(caller).await?;

        let row = self
            .store
            .delete_campaign_image(admin.id, id)
            .await?
            .ok_or_else(|| ActionError::not_found("Image not found"))?;

        match self.storage.path_from_public_url(&row.image_url) {
            Some(path) => {
                if let Err(e) = self.storage.remove(&[path.clone()]).await {
                    tracing::warn!(image = %id, path = %path, error = %e, "failed to remove image blob");
                }
            }
            None => tracing::debug!(image = %id, url = %row.image_url, "image not in managed storage"),
        }

        self.revalidate_campaign(row.campaign_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::campaigns::tests::create;
    use crate::cms::testing::fixture;
    use crate::store::ObjectStorage;

    fn image(campaign_id: Uuid, url: &str, is_primary: bool) -> NewCampaignImage {
        NewCampaignImage {
            campaign_id,
            image_url: url.to_string(),
            image_alt: Some("alt".to_string()),
            is_primary,
        }
    }

    #[tokio::test]
    async fn test_exactly_one_primary_after_adding_primary() {
        let fx = fixture().await;
        let campaign = create(&fx, "primaries", "active").await;

        for (url, primary) in [("/1.jpg", true), ("/2.jpg", false), ("/3.jpg", true)] {
            fx.cms
                .add_campaign_image(&fx.admin, image(campaign.id, url, primary))
                .await
                .unwrap();
        }

        let images = fx.cms.list_campaign_images(campaign.id).await;
        let primaries: Vec<&CampaignImage> = images.iter().filter(|i| i.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].image_url, "/3.jpg");
    }

    #[tokio::test]
    async fn test_appended_orders_are_distinct() {
        let fx = fixture().await;
        let campaign = create(&fx, "orders", "active").await;
        for n in 0..5 {
            fx.cms
                .add_campaign_image(&fx.admin, image(campaign.id, &format!("/{}.jpg", n), false))
                .await
                .unwrap();
        }
        let orders: Vec<i32> = fx
            .cms
            .list_campaign_images(campaign.id)
            .await
            .iter()
            .map(|i| i.display_order)
            .collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_promoting_an_image_demotes_the_others() {
        let fx = fixture().await;
        let campaign = create(&fx, "promote", "active").await;
        let first = fx
            .cms
            .add_campaign_image(&fx.admin, image(campaign.id, "/1.jpg", true))
            .await
            .unwrap();
        let second = fx
            .cms
            .add_campaign_image(&fx.admin, image(campaign.id, "/2.jpg", false))
            .await
            .unwrap();

        fx.cms
            .update_campaign_image(
                &fx.admin,
                second.id,
                CampaignImageChanges {
                    is_primary: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let images = fx.cms.list_campaign_images(campaign.id).await;
        let primary: Vec<Uuid> = images.iter().filter(|i| i.is_primary).map(|i| i.id).collect();
        assert_eq!(primary, vec![second.id]);
        assert!(images.iter().any(|i| i.id == first.id && !i.is_primary));
    }

    #[tokio::test]
    async fn test_image_for_unknown_campaign_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .cms
            .add_campaign_image(&fx.admin, image(Uuid::new_v4(), "/x.jpg", false))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_survives_storage_failure() {
        let fx = fixture().await;
        let campaign = create(&fx, "blob", "active").await;
        let path = format!("campaigns/{}/x.jpg", campaign.id);
        fx.storage.upload(&path, b"\xFF\xD8\xFF", "image/jpeg").await.unwrap();
        let row = fx
            .cms
            .add_campaign_image(&fx.admin, image(campaign.id, &fx.storage.public_url(&path), false))
            .await
            .unwrap();

        fx.storage.set_fail_removals(true);
        fx.cms.delete_campaign_image(&fx.admin, row.id).await.unwrap();

        assert!(fx.cms.list_campaign_images(campaign.id).await.is_empty());
        assert!(fx.storage.contains(&path).await);
    }

    #[tokio::test]
    async fn test_delete_removes_blob() {
        let fx = fixture().await;
        let campaign = create(&fx, "blob-ok", "active").await;
        let path = format!("campaigns/{}/y.jpg", campaign.id);
        fx.storage.upload(&path, b"\xFF\xD8\xFF", "image/jpeg").await.unwrap();
        let row = fx
            .cms
            .add_campaign_image(&fx.admin, image(campaign.id, &fx.storage.public_url(&path), false))
            .await
            .unwrap();

        fx.cms.delete_campaign_image(&fx.admin, row.id).await.unwrap();
        assert!(!fx.storage.contains(&path).await);
    }
}
