//! Program persistence. Same scoped-mutation shape as channels.

use authz::FilterExpression;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use ulid::Ulid;

use model::Program;

use crate::channels::order_by_allowed;
use crate::error::{Result, StoreError};
use crate::sql::{bind_args, lower, SqlArg};
use crate::{ListQuery, Page, Store};

const SORTABLE: &[&str] = &["id", "title", "duration", "created_at", "updated_at"];

#[derive(Debug, Clone)]
pub struct NewProgram {
    pub title: String,
    pub duration: i64,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub channel_id: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProgramPatch {
    pub title: Option<String>,
    pub duration: Option<i64>,
    pub description: Option<String>,
    pub video_url: Option<String>,
}

impl ProgramPatch {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.duration.is_some() {
            fields.push("duration");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.video_url.is_some() {
            fields.push("video_url");
        }
        fields
    }

    pub fn retain_fields(mut self, permitted: &[String]) -> Self {
        let keep = |name: &str| permitted.iter().any(|f| f == name);
        if !keep("title") {
            self.title = None;
        }
        if !keep("duration") {
            self.duration = None;
        }
        if !keep("description") {
            self.description = None;
        }
        if !keep("video_url") {
            self.video_url = None;
        }
        self
    }

    fn columns(&self) -> Vec<(&'static str, SqlArg)> {
        let mut cols = Vec::new();
        if let Some(title) = &self.title {
            cols.push(("title", SqlArg::Text(title.clone())));
        }
        if let Some(duration) = self.duration {
            cols.push(("duration", SqlArg::Int(duration)));
        }
        if let Some(description) = &self.description {
            cols.push(("description", SqlArg::Text(description.clone())));
        }
        if let Some(video_url) = &self.video_url {
            cols.push(("video_url", SqlArg::Text(video_url.clone())));
        }
        cols
    }
}

impl Store {
    pub async fn create_program(&self, program: NewProgram) -> Result<Program> {
        let id = Ulid::new().to_string();
        sqlx::query(
            r#"
            INSERT INTO programs (id, title, duration, description, video_url, channel_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&program.title)
        .bind(program.duration)
        .bind(&program.description)
        .bind(&program.video_url)
        .bind(&program.channel_id)
        .execute(self.pool())
        .await?;

        self.get_program(&id)
            .await?
            .ok_or_else(|| StoreError::RecordNotFound(id))
    }

    pub async fn get_program(&self, id: &str) -> Result<Option<Program>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, duration, description, video_url, channel_id, created_at, updated_at
            FROM programs WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(program_from_row))
    }

    pub async fn fetch_programs(
        &self,
        scope: &FilterExpression,
        query: &ListQuery,
    ) -> Result<Page<Program>> {
        let scope_sql = lower(scope)?;

        let mut clause = format!("({})", scope_sql.clause);
        let mut args = scope_sql.args.clone();
        if let Some(term) = query.global_filter.as_deref().filter(|t| !t.is_empty()) {
            clause.push_str(" AND title LIKE ?");
            args.push(SqlArg::Text(format!("%{}%", term)));
        }

        let total: i64 = {
            let sql = format!("SELECT COUNT(*) FROM programs WHERE {}", clause);
            let row = bind_args(sqlx::query(&sql), &args)
                .fetch_one(self.pool())
                .await?;
            row.get(0)
        };

        let mut sql = format!(
            r#"SELECT id, title, duration, description, video_url, channel_id, created_at, updated_at
            FROM programs WHERE {}"#,
            clause
        );
        sql.push_str(&order_by_allowed(&query.sort, SORTABLE)?);
        if query.limit > 0 {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", query.limit, query.offset));
        }

        let rows = bind_args(sqlx::query(&sql), &args)
            .fetch_all(self.pool())
            .await?;

        Ok(Page {
            records: rows.into_iter().map(program_from_row).collect(),
            total,
        })
    }

    pub async fn update_program_scoped(
        &self,
        id: &str,
        patch: &ProgramPatch,
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
            "UPDATE programs SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND ({})",
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

    pub async fn delete_program_scoped(
        &self,
        id: &str,
        scope: &FilterExpression,
    ) -> Result<u64> {
        let scope_sql = lower(scope)?;
        let sql = format!("DELETE FROM programs WHERE id = ? AND ({})", scope_sql.clause);
        let query = bind_args(sqlx::query(&sql).bind(id), &scope_sql.args);
        Ok(query.execute(self.pool()).await?.rows_affected())
    }
}

fn program_from_row(row: SqliteRow) -> Program {
    Program {
        id: row.get("id"),
        title: row.get("title"),
        duration: row.get("duration"),
        description: row.get("description"),
        video_url: row.get("video_url"),
        channel_id: row.get("channel_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::NewChannel;
    use crate::test_support::open_temp;
    use authz::CondValue;
    use serde_json::json;

    async fn seed(store: &Store) -> String {
        let channel = store
            .create_channel(NewChannel {
                name: "News".into(),
                status: true,
                user_id: None,
            })
            .await
            .unwrap();
        for (title, duration) in [("Morning Show", 60), ("Evening Brief", 30)] {
            store
                .create_program(NewProgram {
                    title: title.into(),
                    duration,
                    description: None,
                    video_url: None,
                    channel_id: channel.id.clone(),
                })
                .await
                .unwrap();
        }
        channel.id
    }

    #[tokio::test]
    async fn fetch_with_channel_scope() {
        let (_dir, store) = open_temp().await;
        let channel_id = seed(&store).await;

        let scope =
            FilterExpression::FieldEquals("channel_id".into(), CondValue::from(json!(channel_id)));
        let page = store
            .fetch_programs(&scope, &ListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let other = FilterExpression::FieldEquals(
            "channel_id".into(),
            CondValue::from(json!("missing")),
        );
        let page = store
            .fetch_programs(&other, &ListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn scoped_program_update() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;
        let page = store
            .fetch_programs(&FilterExpression::Always, &ListQuery::default())
            .await
            .unwrap();
        let program = &page.records[0];

        let rows = store
            .update_program_scoped(
                &program.id,
                &ProgramPatch {
                    duration: Some(45),
                    ..Default::default()
                },
                &FilterExpression::Always,
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);
        let updated = store.get_program(&program.id).await.unwrap().unwrap();
        assert_eq!(updated.duration, 45);
    }
}
