#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use time::{OffsetDateTime, macros::datetime};
use tokio::sync::Mutex;

use snippetbox::application::clock::ManualClock;
use snippetbox::application::repos::{CreateSnippetParams, RepoError, SnippetsRepo};
use snippetbox::application::snippets::SnippetService;
use snippetbox::domain::entities::SnippetRecord;

pub const T0: OffsetDateTime = datetime!(2026-10-16 12:00 UTC);

/// Vec-backed store applying the same watermark rules as the SQL queries.
#[derive(Default)]
pub struct InMemorySnippets {
    rows: Mutex<Vec<SnippetRecord>>,
}

#[async_trait]
impl SnippetsRepo for InMemorySnippets {
    async fn insert_snippet(&self, params: CreateSnippetParams) -> Result<i64, RepoError> {
        let mut rows = self.rows.lock().await;
        let id = rows.len() as i64 + 1;
        rows.push(SnippetRecord {
            id,
            title: params.title,
            content: params.content,
            created_at: params.created_at,
            expires_at: params.expires_at,
        });
        Ok(id)
    }

    async fn find_live_snippet(
        &self,
        id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<SnippetRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| row.id == id && row.is_live_at(now))
            .cloned())
    }

    async fn list_live_snippets(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<SnippetRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .rev()
            .filter(|row| row.is_live_at(now))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Every call fails as if the database were unreachable.
pub struct UnavailableSnippets;

#[async_trait]
impl SnippetsRepo for UnavailableSnippets {
    async fn insert_snippet(&self, _params: CreateSnippetParams) -> Result<i64, RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn find_live_snippet(
        &self,
        _id: i64,
        _now: OffsetDateTime,
    ) -> Result<Option<SnippetRecord>, RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn list_live_snippets(
        &self,
        _now: OffsetDateTime,
        _limit: u32,
    ) -> Result<Vec<SnippetRecord>, RepoError> {
        Err(RepoError::Timeout)
    }
}

pub fn in_memory_service() -> (SnippetService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let service = SnippetService::new(Arc::new(InMemorySnippets::default()), clock.clone());
    (service, clock)
}
