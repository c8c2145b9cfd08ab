use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        snippets::{SnippetError, SnippetService},
    },
    infra::db::PostgresRepositories,
    presentation::{dispatch::RenderDispatcher, views::TemplateData},
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

const SOURCE: &str = "infra::http::public";

pub const HOME_PAGE: &str = "home.html";
pub const VIEW_PAGE: &str = "view.html";
pub const NOT_FOUND_PAGE: &str = "not_found.html";

/// Every page a route below may render.
pub const PAGES: [&str; 3] = [HOME_PAGE, VIEW_PAGE, NOT_FOUND_PAGE];

#[derive(Clone)]
pub struct HttpState {
    pub snippets: Arc<SnippetService>,
    pub renderer: RenderDispatcher,
    pub db: Arc<PostgresRepositories>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/snippet/view/{id}", get(snippet_view))
        .route("/_health/db", get(public_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn home(State(state): State<HttpState>) -> Response {
    match state.snippets.latest().await {
        Ok(records) => {
            let data = TemplateData::new(state.snippets.now()).with_snippets(records);
            state.renderer.render(HOME_PAGE, StatusCode::OK, &data).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn snippet_view(State(state): State<HttpState>, Path(raw_id): Path<String>) -> Response {
    let id = match raw_id.parse::<i64>() {
        Ok(id) if id >= 1 => id,
        _ => return not_found(&state, format!("invalid snippet id `{raw_id}`")).await,
    };

    match state.snippets.get(id).await {
        Ok(record) => {
            let data = TemplateData::new(state.snippets.now()).with_snippet(record);
            state.renderer.render(VIEW_PAGE, StatusCode::OK, &data).await
        }
        Err(SnippetError::NotFound) => {
            not_found(&state, format!("snippet {id} is missing or expired")).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn fallback(State(state): State<HttpState>) -> Response {
    not_found(&state, "no route matched").await
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

async fn not_found(state: &HttpState, detail: impl Into<String>) -> Response {
    let data = TemplateData::new(state.snippets.now());
    let mut response = state
        .renderer
        .render(NOT_FOUND_PAGE, StatusCode::NOT_FOUND, &data)
        .await;
    // A failed render already carries its own report.
    if response.status() == StatusCode::NOT_FOUND {
        ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, detail).attach(&mut response);
    }
    response
}
