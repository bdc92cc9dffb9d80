//! Channel operations.

use tracing::warn;

use model::Channel;
use store::{ChannelPatch, ListQuery, NewChannel, Page};

use crate::error::{ActionsError, Result};
use crate::Console;

/// The updatable columns of a channel, used when a rule grants all
/// fields of the subject.
const CHANNEL_FIELDS: &[&str] = &["name", "status"];

impl Console {
    pub async fn create_channel(&self, user_id: &str, data: NewChannel) -> Result<Channel> {
        let policy = self.policy_for(user_id).await?;
        if !policy.can("create", "Channel") {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(self.store().create_channel(data).await?)
    }

    /// Partial update: the payload is first projected onto the fields
    /// the policy permits, then the statement runs constrained to the
    /// policy's update scope. Either stage can deny.
    pub async fn update_channel(
        &self,
        user_id: &str,
        id: &str,
        patch: ChannelPatch,
    ) -> Result<Channel> {
        let policy = self.policy_for(user_id).await?;

        let permitted = policy.permitted_fields("update", "Channel", CHANNEL_FIELDS);
        let patch = patch.retain_fields(&permitted);
        if patch.touched_fields().is_empty() {
            warn!(user_id, channel_id = id, "update payload has no permitted fields");
            return Err(ActionsError::NoPermittedFields);
        }

        let scope = policy.to_filter("Channel", "update");
        let rows = self.store().update_channel_scoped(id, &patch, &scope).await?;
        if rows == 0 {
            warn!(user_id, channel_id = id, "scoped channel update matched no rows");
            return Err(ActionsError::PermissionDenied);
        }

        self.store()
            .get_channel(id)
            .await?
            .ok_or_else(|| ActionsError::NotFound(id.to_string()))
    }

    pub async fn delete_channel(&self, user_id: &str, id: &str) -> Result<()> {
        let policy = self.policy_for(user_id).await?;
        let scope = policy.to_filter("Channel", "delete");
        let rows = self.store().delete_channel_scoped(id, &scope).await?;
        if rows == 0 {
            warn!(user_id, channel_id = id, "scoped channel delete matched no rows");
            return Err(ActionsError::PermissionDenied);
        }
        Ok(())
    }

    /// Lists the channels the policy lets the user read, with the
    /// caller's search/sort/pagination applied on top.
    pub async fn fetch_channels(
        &self,
        user_id: &str,
        query: &ListQuery,
    ) -> Result<Page<Channel>> {
        let policy = self.policy_for(user_id).await?;
        let scope = policy.to_filter("Channel", "read");
        Ok(self.store().fetch_channels(&scope, query).await?)
    }

    /// Instance-level read: conditions on the rule are checked against
    /// the concrete row.
    pub async fn get_channel(&self, user_id: &str, id: &str) -> Result<Channel> {
        let policy = self.policy_for(user_id).await?;
        let channel = self
            .store()
            .get_channel(id)
            .await?
            .ok_or_else(|| ActionsError::NotFound(id.to_string()))?;
        if !policy.can_instance("read", &channel) {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(channel)
    }

    /// Dashboard counter; intentionally unscoped, like the original
    /// console's channel-count widget.
    pub async fn count_channels(&self) -> Result<i64> {
        Ok(self.store().count_channels().await?)
    }
}
