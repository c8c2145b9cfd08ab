use std::{io, path::PathBuf};

use axum::http::StatusCode;
use thiserror::Error;

use crate::application::error::HttpError;

use super::{compiler::CompositionStep, references::ReferenceKind};

/// Startup failures while building the template cache. All of them are fatal.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to list template directory `{}`", dir.display())]
    Discover {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("template file name `{}` is not valid UTF-8", path.display())]
    NonUtf8Name { path: PathBuf },
    #[error("no page templates found in `{}`", dir.display())]
    NoPages { dir: PathBuf },
    #[error("failed to read {step} template `{}`", path.display())]
    Read {
        step: CompositionStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "page `{page}`: `{template}` uses {kind} on `{target}`, which is not part of the composition"
    )]
    UnresolvedReference {
        page: String,
        template: String,
        kind: ReferenceKind,
        target: String,
    },
    #[error("page `{page}` failed to compile")]
    Parse {
        page: String,
        #[source]
        source: tera::Error,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("no compiled template named `{page}`")]
    CacheMiss { page: String },
    #[error("failed to bind render payload for `{page}`")]
    Bind {
        page: String,
        #[source]
        source: tera::Error,
    },
    #[error("failed to render template `{page}`")]
    Render {
        page: String,
        #[source]
        source: tera::Error,
    },
}

impl TemplateError {
    pub fn cache_miss(page: impl Into<String>) -> Self {
        Self::CacheMiss { page: page.into() }
    }
}

impl From<TemplateError> for HttpError {
    fn from(error: TemplateError) -> Self {
        HttpError::from_error(
            "presentation::templates",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            &error,
        )
    }
}
