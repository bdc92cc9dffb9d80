//! Role and permission persistence.
//!
//! Permission rows keep their `position` column as the evaluation
//! order; every read returns them ordered so the engine sees rules in
//! the order the role editor saved them. Any change to a role's
//! permission set bumps the role's `version`, which is what compiled
//! policy caches key on.

use serde_json::Value as JsonValue;
use sqlx::Row;
use tracing::info;
use ulid::Ulid;

use model::{ActingUser, PermissionRecord, Role};

use crate::error::{Result, StoreError};
use crate::Store;

/// A permission to be stored, minus the generated id and position.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub action: String,
    pub subject: String,
    pub fields: Option<JsonValue>,
    pub inverted: bool,
    pub condition: Option<JsonValue>,
    pub reason: Option<String>,
}

impl NewPermission {
    /// An unconditional grant.
    pub fn grant(action: &str, subject: &str) -> Self {
        Self {
            action: action.into(),
            subject: subject.into(),
            fields: None,
            inverted: false,
            condition: None,
            reason: None,
        }
    }

    /// An unconditional denial.
    pub fn deny(action: &str, subject: &str) -> Self {
        Self {
            inverted: true,
            ..Self::grant(action, subject)
        }
    }

    pub fn with_condition(mut self, condition: JsonValue) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_fields(mut self, fields: JsonValue) -> Self {
        self.fields = Some(fields);
        self
    }
}

impl Store {
    /// Creates a role with its ordered permission list.
    pub async fn create_role(&self, name: &str, permissions: Vec<NewPermission>) -> Result<Role> {
        let role_id = Ulid::new().to_string();
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
            .bind(&role_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;

        for (position, permission) in permissions.iter().enumerate() {
            insert_permission(&mut tx, &role_id, position as i64, permission).await?;
        }

        tx.commit().await?;
        info!(role = name, permissions = permissions.len(), "created role");

        self.get_role(&role_id).await
    }

    /// Replaces a role's permission list and bumps its version, so any
    /// policy compiled against the old permission set stops being
    /// served from caches.
    pub async fn replace_role_permissions(
        &self,
        role_id: &str,
        permissions: Vec<NewPermission>,
    ) -> Result<Role> {
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE roles SET version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(role_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::RoleNotFound(role_id.to_string()));
        }

        sqlx::query("DELETE FROM permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for (position, permission) in permissions.iter().enumerate() {
            insert_permission(&mut tx, role_id, position as i64, permission).await?;
        }

        tx.commit().await?;
        info!(role_id, permissions = permissions.len(), "replaced role permissions");

        self.get_role(role_id).await
    }

    pub async fn delete_role(&self, role_id: &str) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(role_id)
            .execute(self.pool())
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::RoleNotFound(role_id.to_string()));
        }
        Ok(())
    }

    pub async fn get_role(&self, role_id: &str) -> Result<Role> {
        let row = sqlx::query("SELECT id, name, version FROM roles WHERE id = ?")
            .bind(role_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::RoleNotFound(role_id.to_string()))?;

        let permissions = self.role_permissions(role_id).await?;
        Ok(Role {
            id: row.get("id"),
            name: row.get("name"),
            version: row.get("version"),
            permissions,
        })
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        match id {
            Some(id) => Ok(Some(self.get_role(&id).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM roles ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        let mut roles = Vec::with_capacity(ids.len());
        for id in ids {
            roles.push(self.get_role(&id).await?);
        }
        Ok(roles)
    }

    /// The persistence port the authorization layer compiles from: the
    /// user's identity plus their role and its ordered permissions.
    pub async fn role_with_permissions(&self, user_id: &str) -> Result<ActingUser> {
        let row = sqlx::query("SELECT id, role_id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;

        let role_id: Option<String> = row.get("role_id");
        let role = match role_id {
            Some(role_id) => Some(self.get_role(&role_id).await?),
            None => None,
        };

        Ok(ActingUser {
            id: row.get("id"),
            role,
        })
    }

    async fn role_permissions(&self, role_id: &str) -> Result<Vec<PermissionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, subject, fields, inverted, condition, reason
            FROM permissions WHERE role_id = ? ORDER BY position
            "#,
        )
        .bind(role_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PermissionRecord {
                    id: row.get("id"),
                    action: row.get("action"),
                    subject: row.get("subject"),
                    fields: parse_json_column(row.get("fields"))?,
                    inverted: row.get("inverted"),
                    condition: parse_json_column(row.get("condition"))?,
                    reason: row.get("reason"),
                })
            })
            .collect()
    }
}

async fn insert_permission(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    role_id: &str,
    position: i64,
    permission: &NewPermission,
) -> Result<()> {
    let fields = permission
        .fields
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let condition = permission
        .condition
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO permissions (id, role_id, position, action, subject, fields, inverted, condition, reason)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Ulid::new().to_string())
    .bind(role_id)
    .bind(position)
    .bind(&permission.action)
    .bind(&permission.subject)
    .bind(fields)
    .bind(permission.inverted)
    .bind(condition)
    .bind(&permission.reason)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Permission payload columns hold JSON text; NULL means absent. Text
/// that fails to parse is carried through as a JSON string so the
/// engine's fail-open path (and its diagnostic) still sees it.
fn parse_json_column(raw: Option<String>) -> Result<Option<JsonValue>> {
    Ok(raw.map(|text| {
        serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_temp;
    use crate::users::NewUser;
    use serde_json::json;

    #[tokio::test]
    async fn role_round_trip_preserves_permission_order() {
        let (_dir, store) = open_temp().await;
        let role = store
            .create_role(
                "editor",
                vec![
                    NewPermission::grant("read", "Channel"),
                    NewPermission::grant("update", "Channel")
                        .with_condition(json!({ "user_id": "{{id}}" }))
                        .with_fields(json!(["name", "status"])),
                    NewPermission::deny("update", "Channel")
                        .with_condition(json!({ "status": false })),
                ],
            )
            .await
            .unwrap();

        assert_eq!(role.version, 1);
        let actions: Vec<&str> = role.permissions.iter().map(|p| p.action.as_str()).collect();
        assert_eq!(actions, vec!["read", "update", "update"]);
        assert!(role.permissions[2].inverted);
        assert_eq!(
            role.permissions[1].condition,
            Some(json!({ "user_id": "{{id}}" }))
        );
        assert_eq!(role.permissions[1].fields, Some(json!(["name", "status"])));
    }

    #[tokio::test]
    async fn replace_permissions_bumps_version() {
        let (_dir, store) = open_temp().await;
        let role = store
            .create_role("temp", vec![NewPermission::grant("read", "Channel")])
            .await
            .unwrap();

        let updated = store
            .replace_role_permissions(&role.id, vec![NewPermission::grant("manage", "Channel")])
            .await
            .unwrap();

        assert_eq!(updated.version, role.version + 1);
        assert_eq!(updated.permissions.len(), 1);
        assert_eq!(updated.permissions[0].action, "manage");
    }

    #[tokio::test]
    async fn role_with_permissions_loads_acting_user() {
        let (_dir, store) = open_temp().await;
        let role = store
            .create_role("scoped", vec![NewPermission::grant("read", "Channel")])
            .await
            .unwrap();
        let user = store
            .create_user(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password: "hash".into(),
                role_id: Some(role.id.clone()),
            })
            .await
            .unwrap();

        let acting = store.role_with_permissions(&user.id).await.unwrap();
        assert_eq!(acting.id, user.id);
        let loaded = acting.role.expect("role should load");
        assert_eq!(loaded.id, role.id);
        assert_eq!(loaded.permissions.len(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let (_dir, store) = open_temp().await;
        let err = store.role_with_permissions("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn user_without_role_has_none() {
        let (_dir, store) = open_temp().await;
        let user = store
            .create_user(NewUser {
                name: "Solo".into(),
                email: "solo@example.com".into(),
                password: "hash".into(),
                role_id: None,
            })
            .await
            .unwrap();
        let acting = store.role_with_permissions(&user.id).await.unwrap();
        assert!(acting.role.is_none());
    }
}
