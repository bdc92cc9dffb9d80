//! Policy-gated operations for the Airshow admin console.
//!
//! Each operation loads the acting user's role through the
//! [`RoleDirectory`] port, obtains the compiled [`Policy`](authz::Policy)
//! from the per-process cache, and uses it three ways:
//!
//! - subject-level `can` checks gate create endpoints and the user CRUD
//! - `permitted_fields` projects partial-update payloads before any SQL
//!   runs; a payload left empty by the projection is a hard denial
//! - `to_filter` scopes list queries and the WHERE clause of update and
//!   delete statements, so data-scoped rules hold inside the database
//!
//! Every denial surfaces as [`ActionsError::PermissionDenied`] (or
//! [`ActionsError::NoPermittedFields`]); a missing role or user id is
//! an error, never a grant.

pub mod error;
pub mod port;

mod channels;
mod policy_cache;
mod programs;
mod roles;
mod users;

pub use error::{ActionsError, Result};
pub use policy_cache::PolicyCache;
pub use port::RoleDirectory;

use std::sync::Arc;

use authz::Policy;
use store::Store;

/// The console's operation surface, bundling the store, the role
/// lookup port, and the policy cache.
pub struct Console {
    store: Arc<Store>,
    directory: Arc<dyn RoleDirectory>,
    policies: PolicyCache,
}

impl Console {
    /// Uses the store itself as the role directory.
    pub fn new(store: Arc<Store>) -> Self {
        let directory: Arc<dyn RoleDirectory> = store.clone();
        Self {
            store,
            directory,
            policies: PolicyCache::new(),
        }
    }

    /// Injects a custom role directory (tests, alternative backends).
    pub fn with_directory(store: Arc<Store>, directory: Arc<dyn RoleDirectory>) -> Self {
        Self {
            store,
            directory,
            policies: PolicyCache::new(),
        }
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn policies(&self) -> &PolicyCache {
        &self.policies
    }

    /// Loads and compiles the acting user's policy.
    pub(crate) async fn policy_for(&self, user_id: &str) -> Result<Arc<Policy>> {
        let user = self.directory.role_with_permissions(user_id).await?;
        Ok(self.policies.get_or_compile(&user)?)
    }
}
