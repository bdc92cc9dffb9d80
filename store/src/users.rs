//! User account persistence.
//!
//! Passwords arrive pre-hashed; hashing lives with the authentication
//! layer, not here.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use ulid::Ulid;

use model::User;

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<String>,
}

impl Store {
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        if let Some(role_id) = &user.role_id {
            self.get_role(role_id).await?;
        }

        let id = Ulid::new().to_string();
        sqlx::query("INSERT INTO users (id, name, email, password, role_id) VALUES (?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password)
            .bind(&user.role_id)
            .execute(self.pool())
            .await?;

        self.get_user(&id)
            .await?
            .ok_or_else(|| StoreError::UserNotFound(id))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, password, role_id, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(user_from_row))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, name, email, password, role_id, created_at, updated_at FROM users ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    pub async fn count_users(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?)
    }

    pub async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User> {
        if let Some(role_id) = &patch.role_id {
            self.get_role(role_id).await?;
        }

        let mut assignments = Vec::new();
        if patch.name.is_some() {
            assignments.push("name = ?");
        }
        if patch.email.is_some() {
            assignments.push("email = ?");
        }
        if patch.password.is_some() {
            assignments.push("password = ?");
        }
        if patch.role_id.is_some() {
            assignments.push("role_id = ?");
        }
        if assignments.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        let sql = format!(
            "UPDATE users SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            assignments.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in [&patch.name, &patch.email, &patch.password, &patch.role_id]
            .into_iter()
            .flatten()
        {
            query = query.bind(value.clone());
        }
        let updated = query.bind(id).execute(self.pool()).await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(id.to_string()));
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()))
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn user_from_row(row: SqliteRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password: row.get("password"),
        role_id: row.get("role_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
