//! Per-request payloads handed to page templates.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::entities::SnippetRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetView {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl From<SnippetRecord> for SnippetView {
    fn from(record: SnippetRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content: record.content,
            created: record.created_at,
            expires: record.expires_at,
        }
    }
}

/// Data bound to a render unit for a single response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub snippet: Option<SnippetView>,
    pub snippets: Vec<SnippetView>,
}

impl TemplateData {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            current_year: now.year(),
            snippet: None,
            snippets: Vec::new(),
        }
    }

    pub fn with_snippet(mut self, record: SnippetRecord) -> Self {
        self.snippet = Some(record.into());
        self
    }

    pub fn with_snippets(mut self, records: Vec<SnippetRecord>) -> Self {
        self.snippets = records.into_iter().map(SnippetView::from).collect();
        self
    }
}
