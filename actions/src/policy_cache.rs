//! Per-process cache of compiled policies.
//!
//! Keyed by (user id, role version): a role edit bumps the version, so
//! a policy compiled against the old permission set can never be served
//! for the new one. Entries for superseded versions are dropped when a
//! newer one is inserted for the same user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use authz::{compile, Policy};
use model::ActingUser;

#[derive(Default)]
pub struct PolicyCache {
    inner: Mutex<HashMap<String, (i64, Arc<Policy>)>>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached policy for the user's current role version,
    /// compiling and storing it on a miss. Compilation errors are
    /// never cached.
    pub fn get_or_compile(&self, user: &ActingUser) -> authz::Result<Arc<Policy>> {
        let version = match &user.role {
            Some(role) => role.version,
            // Let compile() produce the proper error.
            None => return Ok(Arc::new(compile(user)?)),
        };

        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_version, policy)) = cache.get(&user.id) {
            if *cached_version == version {
                return Ok(Arc::clone(policy));
            }
        }

        let policy = Arc::new(compile(user)?);
        cache.insert(user.id.clone(), (version, Arc::clone(&policy)));
        Ok(policy)
    }

    /// Drops one user's entry, e.g. after reassigning their role.
    pub fn invalidate_user(&self, user_id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id);
    }

    /// Drops everything, e.g. after editing a role's permission set.
    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{PermissionRecord, Role};

    fn user(version: i64, permissions: Vec<PermissionRecord>) -> ActingUser {
        ActingUser::new(
            "u1",
            Role {
                id: "r1".into(),
                name: "test".into(),
                version,
                permissions,
            },
        )
    }

    fn read_channel() -> PermissionRecord {
        PermissionRecord {
            id: "p1".into(),
            action: "read".into(),
            subject: "Channel".into(),
            fields: None,
            inverted: false,
            condition: None,
            reason: None,
        }
    }

    #[test]
    fn same_version_hits_cache() {
        let cache = PolicyCache::new();
        let a = cache.get_or_compile(&user(1, vec![read_channel()])).unwrap();
        let b = cache.get_or_compile(&user(1, vec![read_channel()])).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn version_bump_recompiles() {
        let cache = PolicyCache::new();
        let old = cache.get_or_compile(&user(1, vec![read_channel()])).unwrap();
        assert!(old.can("read", "Channel"));

        // Same user, new role version with no permissions.
        let new = cache.get_or_compile(&user(2, vec![])).unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(!new.can("read", "Channel"));
    }

    #[test]
    fn invalidation_drops_entry() {
        let cache = PolicyCache::new();
        let a = cache.get_or_compile(&user(1, vec![read_channel()])).unwrap();
        cache.invalidate_user("u1");
        let b = cache.get_or_compile(&user(1, vec![read_channel()])).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn missing_role_is_not_cached() {
        let cache = PolicyCache::new();
        let user = ActingUser {
            id: "u1".into(),
            role: None,
        };
        assert!(cache.get_or_compile(&user).is_err());
    }
}
