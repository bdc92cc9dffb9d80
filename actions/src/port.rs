//! The persistence port the action layer compiles policies from.

use async_trait::async_trait;

use model::ActingUser;
use store::Store;

use crate::error::Result;

/// Read-only lookup of a user's role and its ordered permission
/// records. Injected rather than reached for globally, so tests and
/// alternative backends can supply their own.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_with_permissions(&self, user_id: &str) -> Result<ActingUser>;
}

#[async_trait]
impl RoleDirectory for Store {
    async fn role_with_permissions(&self, user_id: &str) -> Result<ActingUser> {
        Ok(Store::role_with_permissions(self, user_id).await?)
    }
}
