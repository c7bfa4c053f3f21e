//! Campaign update timeline.

use uuid::Uuid;

use super::cache::mark_degraded;
use super::{ActionError, ActionResult, Caller, Cms};
use crate::db::models::{CampaignUpdate, NewCampaignUpdate};

impl Cms {
    /// Newest `update_date` first.
    pub async fn get_campaign_updates(&self, campaign_id: Uuid) -> Vec<CampaignUpdate> {
        self.store
            .list_campaign_updates(campaign_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(campaign = %campaign_id, error = %e, "failed to list updates");
                mark_degraded();
                Vec::new()
            })
    }

    pub async fn add_campaign_update(
        &self,
        caller: &Caller,
        update: NewCampaignUpdate,
    ) -> ActionResult<CampaignUpdate> {
        let admin = self.require_admin(caller).await?;
        if update.content.trim().is_empty() {
            return Err(ActionError::validation("Update content is required"));
        }
        let update = NewCampaignUpdate {
            content: ammonia::clean(update.content.trim()),
            ..update
        };

        let row = self
            .store
            .insert_campaign_update(admin.id, &update)
            .await
            .map_err(|e| match ActionError::from(e) {
                ActionError::Conflict(_) => ActionError::not_found("Campaign not found"),
                other => other,
            })?;

        tracing::info!(campaign = %row.campaign_id, update = %row.id, "campaign update added");
        self.revalidate_campaign(row.campaign_id).await;
        Ok(row)
    }

    pub async fn delete_campaign_update(&self, caller: &Caller, id: Uuid) -> ActionResult<()> {
        let admin = self.require_admin(caller).await?;
        if !self.store.delete_campaign_update(admin.id, id).await? {
            return Err(ActionError::not_found("Update not found"));
        }
        self.revalidate(&["/campaigns"]).await;
        Ok(())
    }
}
