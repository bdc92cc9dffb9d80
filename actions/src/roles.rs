//! Role management operations.
//!
//! Editing roles is the console's most privileged surface; it requires
//! the full `manage`/`all` wildcard pair. Any permission-set change
//! clears the policy cache, since cached policies for every user of
//! the role were compiled against the old rules.

use model::Role;
use store::NewPermission;

use crate::error::{ActionsError, Result};
use crate::Console;

impl Console {
    pub async fn create_role(
        &self,
        acting_user_id: &str,
        name: &str,
        permissions: Vec<NewPermission>,
    ) -> Result<Role> {
        self.require_role_admin(acting_user_id).await?;
        Ok(self.store().create_role(name, permissions).await?)
    }

    pub async fn update_role_permissions(
        &self,
        acting_user_id: &str,
        role_id: &str,
        permissions: Vec<NewPermission>,
    ) -> Result<Role> {
        self.require_role_admin(acting_user_id).await?;
        let role = self
            .store()
            .replace_role_permissions(role_id, permissions)
            .await?;
        self.policies().clear();
        Ok(role)
    }

    pub async fn delete_role(&self, acting_user_id: &str, role_id: &str) -> Result<()> {
        self.require_role_admin(acting_user_id).await?;
        self.store().delete_role(role_id).await?;
        self.policies().clear();
        Ok(())
    }

    pub async fn list_roles(&self, acting_user_id: &str) -> Result<Vec<Role>> {
        self.require_role_admin(acting_user_id).await?;
        Ok(self.store().list_roles().await?)
    }

    async fn require_role_admin(&self, acting_user_id: &str) -> Result<()> {
        let policy = self.policy_for(acting_user_id).await?;
        if !policy.can("manage", "all") {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(())
    }
}
