use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreateSnippetParams, RepoError, SnippetsRepo},
    domain::entities::SnippetRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SnippetRow {
    id: i64,
    title: String,
    content: String,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl From<SnippetRow> for SnippetRecord {
    fn from(row: SnippetRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl SnippetsRepo for PostgresRepositories {
    async fn insert_snippet(&self, params: CreateSnippetParams) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO snippets (title, content, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&params.title)
        .bind(&params.content)
        .bind(params.created_at)
        .bind(params.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_live_snippet(
        &self,
        id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<SnippetRecord>, RepoError> {
        let row = sqlx::query_as::<_, SnippetRow>(
            r#"
            SELECT id, title, content, created_at, expires_at
            FROM snippets
            WHERE id = $1 AND expires_at > $2
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SnippetRecord::from))
    }

    async fn list_live_snippets(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<SnippetRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SnippetRow>(
            r#"
            SELECT id, title, content, created_at, expires_at
            FROM snippets
            WHERE expires_at > $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SnippetRecord::from).collect())
    }
}
