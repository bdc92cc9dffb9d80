//! User management operations.
//!
//! These are gated at the subject level, as the original console does:
//! whoever may update users may update any user. Data-scoped user
//! administration would be expressed with conditions, same as channels.

use model::User;
use store::{NewUser, UserPatch};

use crate::error::{ActionsError, Result};
use crate::Console;

impl Console {
    pub async fn create_user(&self, acting_user_id: &str, data: NewUser) -> Result<User> {
        let policy = self.policy_for(acting_user_id).await?;
        if !policy.can("create", "User") {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(self.store().create_user(data).await?)
    }

    pub async fn update_user(
        &self,
        acting_user_id: &str,
        id: &str,
        patch: UserPatch,
    ) -> Result<User> {
        let policy = self.policy_for(acting_user_id).await?;
        if !policy.can("update", "User") {
            return Err(ActionsError::PermissionDenied);
        }
        let role_changed = patch.role_id.is_some();
        let user = self.store().update_user(id, &patch).await?;
        if role_changed {
            // The target's cached policy was compiled for the old role.
            self.policies().invalidate_user(id);
        }
        Ok(user)
    }

    pub async fn delete_user(&self, acting_user_id: &str, id: &str) -> Result<()> {
        let policy = self.policy_for(acting_user_id).await?;
        if !policy.can("delete", "User") {
            return Err(ActionsError::PermissionDenied);
        }
        self.store().delete_user(id).await?;
        self.policies().invalidate_user(id);
        Ok(())
    }

    pub async fn list_users(&self, acting_user_id: &str) -> Result<Vec<User>> {
        let policy = self.policy_for(acting_user_id).await?;
        if !policy.can("read", "User") {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(self.store().list_users().await?)
    }

    pub async fn get_user(&self, acting_user_id: &str, id: &str) -> Result<User> {
        let policy = self.policy_for(acting_user_id).await?;
        let user = self
            .store()
            .get_user(id)
            .await?
            .ok_or_else(|| ActionsError::NotFound(id.to_string()))?;
        if !policy.can_instance("read", &user) {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(user)
    }

    /// Dashboard counter; unscoped like the channel count.
    pub async fn count_users(&self) -> Result<i64> {
        Ok(self.store().count_users().await?)
    }
}
