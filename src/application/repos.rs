//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::SnippetRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateSnippetParams {
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Snippet persistence.
///
/// Every read takes the caller's `now` as the expiry watermark; rows with
/// `expires_at <= now` must never be returned.
#[async_trait]
pub trait SnippetsRepo: Send + Sync {
    async fn insert_snippet(&self, params: CreateSnippetParams) -> Result<i64, RepoError>;

    async fn find_live_snippet(
        &self,
        id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<SnippetRecord>, RepoError>;

    /// Live snippets ordered by id descending, at most `limit` of them.
    async fn list_live_snippets(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<SnippetRecord>, RepoError>;
}
