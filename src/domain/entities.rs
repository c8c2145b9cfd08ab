//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

/// A stored text snippet with a bounded visibility window.
///
/// Snippets are created once and never mutated. A snippet is visible to
/// readers only while the current time is strictly before `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SnippetRecord {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}
