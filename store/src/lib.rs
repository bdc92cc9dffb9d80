//! SQLite persistence for the Airshow admin backend.
//!
//! Owns the schema for users, roles, permissions, channels, and
//! programs, and exposes the CRUD surface the action layer drives.
//! List and mutation queries accept an authorization
//! [`FilterExpression`](authz::FilterExpression), lowered to a SQL
//! predicate by [`sql`], so policy scoping happens inside the database.

pub mod error;
pub mod sql;

mod channels;
mod programs;
mod roles;
mod users;

pub use channels::{ChannelPatch, NewChannel};
pub use error::{Result, StoreError};
pub use programs::{NewProgram, ProgramPatch};
pub use roles::NewPermission;
pub use sql::{SqlArg, SqlFilter};
pub use users::{NewUser, UserPatch};

use std::path::PathBuf;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Configuration for the console database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/airshow.db"),
            max_connections: 5,
        }
    }
}

/// Listing parameters shared by the table endpoints: a global search
/// term, column ordering, and pagination.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Case-insensitive substring match on the table's search column.
    pub global_filter: Option<String>,
    /// `(column, descending)` pairs, applied in order.
    pub sort: Vec<(String, bool)>,
    pub offset: i64,
    /// Zero means no limit.
    pub limit: i64,
}

/// A page of rows plus the total row count under the same predicate.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: i64,
}

/// The console database.
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Opens (creating if needed) the database and brings the schema
    /// and seed roles up to date.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&config.database_path)
                    .create_if_missing(true),
            )
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        store.seed_default_roles().await?;

        info!(
            path = %config.database_path.display(),
            "console database initialized"
        );

        Ok(store)
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        info!("running console database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS permissions (
                id TEXT PRIMARY KEY,
                role_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                action TEXT NOT NULL,
                subject TEXT NOT NULL,
                fields TEXT,
                inverted INTEGER NOT NULL DEFAULT 0,
                condition TEXT,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role_id TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                user_id TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS programs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                duration INTEGER NOT NULL DEFAULT 0,
                description TEXT,
                video_url TEXT,
                channel_id TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (channel_id) REFERENCES channels(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_permissions_role ON permissions(role_id, position)",
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
            "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role_id)",
            "CREATE INDEX IF NOT EXISTS idx_channels_user ON channels(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_programs_channel ON programs(channel_id)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("console database migrations completed");
        Ok(())
    }

    /// Seeds the two roles every installation starts from: an admin
    /// with full access and a read-only viewer.
    async fn seed_default_roles(&self) -> Result<()> {
        let defaults = vec![
            ("admin", vec![NewPermission::grant("manage", "all")]),
            ("viewer", vec![NewPermission::grant("read", "all")]),
        ];

        for (name, permissions) in defaults {
            let exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE name = ?)")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;

            if !exists {
                self.create_role(name, permissions).await?;
                info!(role = name, "seeded default role");
            }
        }

        Ok(())
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema_and_seed_roles() {
        let (_dir, store) = test_support::open_temp().await;

        let role_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(role_count, 2); // admin, viewer

        let admin = store.find_role_by_name("admin").await.unwrap().unwrap();
        assert_eq!(admin.permissions.len(), 1);
        assert_eq!(admin.permissions[0].action, "manage");
        assert_eq!(admin.permissions[0].subject, "all");
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StoreConfig {
            database_path: dir.path().join("test.db"),
            max_connections: 5,
        };
        let store = Store::open(config.clone()).await.unwrap();
        store.close().await;

        let store = Store::open(config).await.unwrap();
        let role_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(role_count, 2);
    }
}
