use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{application::error::ErrorReport, presentation::dispatch::RenderedPage};

const TARGET: &str = "snippetbox::http::response";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
}

/// Tag the request with a fresh id and echo it in the `x-request-id` header.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// One log line per response, naming the page that was rendered.
///
/// Successful responses are logged at debug. 4xx and 5xx responses carry the
/// report the handler or dispatcher attached. Streaming failures after the
/// first flush are logged by the dispatcher, since the status line has already
/// gone out as a success.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let served = Served {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        request_id: request
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.request_id.to_string())
            .unwrap_or_default(),
        started_at: Instant::now(),
    };

    let mut response = next.run(request).await;
    let status = response.status();
    let page = response
        .extensions()
        .get::<RenderedPage>()
        .map(|page| page.0.clone())
        .unwrap_or_else(|| "-".to_string());

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        served.failed(status, &page, report);
    } else {
        served.succeeded(status, &page);
    }

    response
}

struct Served {
    method: Method,
    path: String,
    request_id: String,
    started_at: Instant,
}

impl Served {
    fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    fn succeeded(&self, status: StatusCode, page: &str) {
        debug!(
            target = TARGET,
            status = status.as_u16(),
            method = %self.method,
            path = %self.path,
            page,
            elapsed_ms = self.elapsed_ms(),
            request_id = %self.request_id,
            "page served",
        );
    }

    fn failed(&self, status: StatusCode, page: &str, report: Option<ErrorReport>) {
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available");

        if status.is_server_error() {
            error!(
                target = TARGET,
                status = status.as_u16(),
                method = %self.method,
                path = %self.path,
                page,
                elapsed_ms = self.elapsed_ms(),
                source,
                detail,
                chain = ?messages,
                request_id = %self.request_id,
                "request failed",
            );
        } else {
            warn!(
                target = TARGET,
                status = status.as_u16(),
                method = %self.method,
                path = %self.path,
                page,
                elapsed_ms = self.elapsed_ms(),
                source,
                detail,
                request_id = %self.request_id,
                "client request error",
            );
        }
    }
}
