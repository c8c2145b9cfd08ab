//! Snippet reads and writes bounded by the expiry watermark.

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::application::clock::{Clock, truncate_to_micros};
use crate::application::error::HttpError;
use crate::application::repos::{CreateSnippetParams, RepoError, SnippetsRepo};
use crate::domain::entities::SnippetRecord;
use crate::domain::validation::{Validator, max_chars, not_blank, permitted_value};

const SOURCE: &str = "application::snippets::SnippetService";
const SECONDS_PER_DAY: i64 = 86_400;

/// Upper bound on the number of snippets returned by [`SnippetService::latest`].
pub const LATEST_LIMIT: u32 = 10;
pub const MAX_TITLE_CHARS: usize = 100;
pub const PERMITTED_EXPIRY_DAYS: [i64; 3] = [1, 7, 365];

#[derive(Debug, Error)]
pub enum SnippetError {
    /// The snippet does not exist or has expired. Callers cannot tell which.
    #[error("snippet not found")]
    NotFound,
    #[error("snippet storage failed during `{operation}`")]
    Storage {
        operation: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("snippet validation failed: {0}")]
    Validation(Validator),
}

impl SnippetError {
    fn storage(operation: &'static str, source: RepoError) -> Self {
        Self::Storage { operation, source }
    }
}

impl From<SnippetError> for HttpError {
    fn from(error: SnippetError) -> Self {
        match error {
            SnippetError::NotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Not Found",
                "snippet not found",
            ),
            SnippetError::Validation(ref validator) => HttpError::new(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                "Unprocessable Entity",
                validator.to_string(),
            ),
            SnippetError::Storage { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                &error,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateSnippetCommand {
    pub title: String,
    pub content: String,
    pub expires_days: i64,
}

impl CreateSnippetCommand {
    pub fn validate(&self) -> Result<(), Validator> {
        let mut validator = Validator::new();
        validator.check_field(
            not_blank(&self.title),
            "title",
            "This field cannot be blank",
        );
        validator.check_field(
            max_chars(&self.title, MAX_TITLE_CHARS),
            "title",
            "This field cannot be more than 100 characters long",
        );
        validator.check_field(
            not_blank(&self.content),
            "content",
            "This field cannot be blank",
        );
        validator.check_field(
            permitted_value(&self.expires_days, &PERMITTED_EXPIRY_DAYS),
            "expires",
            "This field must equal 1, 7 or 365",
        );

        if validator.is_valid() {
            Ok(())
        } else {
            Err(validator)
        }
    }
}

#[derive(Clone)]
pub struct SnippetService {
    snippets: Arc<dyn SnippetsRepo>,
    clock: Arc<dyn Clock>,
}

impl SnippetService {
    pub fn new(snippets: Arc<dyn SnippetsRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { snippets, clock }
    }

    /// Store a snippet that expires `expires_days` days from now.
    pub async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i64,
    ) -> Result<i64, SnippetError> {
        let created_at = truncate_to_micros(self.clock.now());
        let expires_at = expiry_after(created_at, expires_days)?;

        let id = self
            .snippets
            .insert_snippet(CreateSnippetParams {
                title: title.to_string(),
                content: content.to_string(),
                created_at,
                expires_at,
            })
            .await
            .map_err(|err| SnippetError::storage("insert_snippet", err))?;

        debug!(
            target = "snippetbox::snippets",
            id,
            expires_at = %expires_at,
            "snippet stored"
        );
        Ok(id)
    }

    /// Validate the command and store it.
    pub async fn create(&self, command: CreateSnippetCommand) -> Result<i64, SnippetError> {
        command.validate().map_err(SnippetError::Validation)?;
        self.insert(&command.title, &command.content, command.expires_days)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<SnippetRecord, SnippetError> {
        let now = self.clock.now();
        match self.snippets.find_live_snippet(id, now).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) | Err(RepoError::NotFound) => Err(SnippetError::NotFound),
            Err(err) => Err(SnippetError::storage("find_live_snippet", err)),
        }
    }

    pub async fn latest(&self) -> Result<Vec<SnippetRecord>, SnippetError> {
        let now = self.clock.now();
        self.snippets
            .list_live_snippets(now, LATEST_LIMIT)
            .await
            .map_err(|err| SnippetError::storage("list_live_snippets", err))
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }
}

fn expiry_after(
    created_at: OffsetDateTime,
    expires_days: i64,
) -> Result<OffsetDateTime, SnippetError> {
    expires_days
        .checked_mul(SECONDS_PER_DAY)
        .map(Duration::seconds)
        .and_then(|offset| created_at.checked_add(offset))
        .ok_or_else(|| {
            let mut validator = Validator::new();
            validator.add_field_error("expires", "This field is out of range");
            SnippetError::Validation(validator)
        })
}
