//! Channel persistence.
//!
//! Mutations take an authorization scope: the UPDATE/DELETE predicate
//! is `id = ? AND (<scope>)`, so a data-scoped policy rule keeps the
//! statement from touching rows the user cannot reach. Zero affected
//! rows is reported as-is; the action layer turns it into a denial.

use authz::FilterExpression;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use ulid::Ulid;

use model::Channel;

use crate::error::{Result, StoreError};
use crate::sql::{bind_args, lower, SqlArg};
use crate::{ListQuery, Page, Store};

/// Columns the listing endpoint accepts for ordering.
const SORTABLE: &[&str] = &["id", "name", "status", "created_at", "updated_at"];

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub name: String,
    pub status: bool,
    pub user_id: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub status: Option<bool>,
}

impl ChannelPatch {
    /// Field names carried by this patch, in declaration order.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        fields
    }

    /// Drops every field not named in `permitted`.
    pub fn retain_fields(mut self, permitted: &[String]) -> Self {
        if !permitted.iter().any(|f| f == "name") {
            self.name = None;
        }
        if !permitted.iter().any(|f| f == "status") {
            self.status = None;
        }
        self
    }

    fn columns(&self) -> Vec<(&'static str, SqlArg)> {
        let mut cols = Vec::new();
        if let Some(name) = &self.name {
            cols.push(("name", SqlArg::Text(name.clone())));
        }
        if let Some(status) = self.status {
            cols.push(("status", SqlArg::Bool(status)));
        }
        cols
    }
}

impl Store {
    pub async fn create_channel(&self, channel: NewChannel) -> Result<Channel> {
        let id = Ulid::new().to_string();
        sqlx::query("INSERT INTO channels (id, name, status, user_id) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&channel.name)
            .bind(channel.status)
            .bind(&channel.user_id)
            .execute(self.pool())
            .await?;

        self.get_channel(&id)
            .await?
            .ok_or_else(|| StoreError::RecordNotFound(id))
    }

    pub async fn get_channel(&self, id: &str) -> Result<Option<Channel>> {
        let row = sqlx::query(
            "SELECT id, name, status, user_id, created_at, updated_at FROM channels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(channel_from_row))
    }

    /// Lists channels inside the authorization scope, with the global
    /// name search, ordering, and pagination applied on top. Returns
    /// the page plus the total row count under the same predicate.
    pub async fn fetch_channels(
        &self,
        scope: &FilterExpression,
        query: &ListQuery,
    ) -> Result<Page<Channel>> {
        let scope_sql = lower(scope)?;

        let mut clause = format!("({})", scope_sql.clause);
        let mut args = scope_sql.args.clone();
        if let Some(term) = query
            .global_filter
            .as_deref()
            .filter(|t| !t.is_empty())
        {
            clause.push_str(" AND name LIKE ?");
            args.push(SqlArg::Text(format!("%{}%", term)));
        }

        let total: i64 = {
            let sql = format!("SELECT COUNT(*) FROM channels WHERE {}", clause);
            let row = bind_args(sqlx::query(&sql), &args)
                .fetch_one(self.pool())
                .await?;
            row.get(0)
        };

        let mut sql = format!(
            "SELECT id, name, status, user_id, created_at, updated_at FROM channels WHERE {}",
            clause
        );
        sql.push_str(&order_by(&query.sort)?);
        if query.limit > 0 {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", query.limit, query.offset));
        }

        let rows = bind_args(sqlx::query(&sql), &args)
            .fetch_all(self.pool())
            .await?;

        Ok(Page {
            records: rows.into_iter().map(channel_from_row).collect(),
            total,
        })
    }

    pub async fn count_channels(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM channels")
            .fetch_one(self.pool())
            .await?)
    }

    /// Applies a patch to one channel, constrained to the scope.
    /// Returns the number of rows updated (0 or 1).
    pub async fn update_channel_scoped(
        &self,
        id: &str,
        patch: &ChannelPatch,
        scope: &FilterExpression,
    ) -> Result<u64> {
        let columns = patch.columns();
        if columns.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        let scope_sql = lower(scope)?;

        let assignments: Vec<String> =
            columns.iter().map(|(col, _)| format!("{} = ?", col)).collect();
        let sql = format!(
            "UPDATE channels SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND ({})",
            assignments.join(", "),
            scope_sql.clause
        );

        let mut query = sqlx::query(&sql);
        for (_, arg) in &columns {
            query = bind_args(query, std::slice::from_ref(arg));
        }
        query = query.bind(id);
        query = bind_args(query, &scope_sql.args);

        Ok(query.execute(self.pool()).await?.rows_affected())
    }

    /// Deletes one channel, constrained to the scope. Returns the
    /// number of rows deleted (0 or 1).
    pub async fn delete_channel_scoped(
        &self,
        id: &str,
        scope: &FilterExpression,
    ) -> Result<u64> {
        let scope_sql = lower(scope)?;
        let sql = format!(
            "DELETE FROM channels WHERE id = ? AND ({})",
            scope_sql.clause
        );
        let query = bind_args(sqlx::query(&sql).bind(id), &scope_sql.args);
        Ok(query.execute(self.pool()).await?.rows_affected())
    }
}

fn channel_from_row(row: SqliteRow) -> Channel {
    Channel {
        id: row.get("id"),
        name: row.get("name"),
        status: row.get("status"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn order_by(sort: &[(String, bool)]) -> Result<String> {
    order_by_allowed(sort, SORTABLE)
}

/// Builds an ORDER BY clause from whitelisted column names. Anything
/// outside the whitelist is rejected rather than spliced into SQL.
pub(crate) fn order_by_allowed(sort: &[(String, bool)], allowed: &[&str]) -> Result<String> {
    if sort.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(sort.len());
    for (column, desc) in sort {
        if !allowed.contains(&column.as_str()) {
            return Err(StoreError::InvalidFilter(format!(
                "'{}' is not a sortable column",
                column
            )));
        }
        parts.push(format!("{} {}", column, if *desc { "DESC" } else { "ASC" }));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}
