//! Executes a cached render unit against a payload and streams the output.
//!
//! A render moves through `lookup -> bind -> execute` and ends in one of the
//! [`RenderOutcome`] states. Output is buffered until it crosses the flush
//! threshold; nothing reaches the client before the first flush. A failure
//! before that point becomes a plain 500 response. A failure after it cannot
//! change the status line any more, so the body stream is aborted and the
//! error is logged. A body dropped by the client before the render finishes
//! is recorded as abandoned.

use std::{io, num::NonZeroUsize, sync::Arc, time::Instant};

use async_stream::stream;
use axum::{
    body::Body,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::{counter, histogram};
use tera::Context;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{
    templates::{TemplateCache, TemplateError},
    views::TemplateData,
};
use crate::application::error::HttpError;

const SOURCE: &str = "presentation::dispatch";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const FRAME_CAPACITY: usize = 8;

pub const DEFAULT_FLUSH_THRESHOLD: usize = 8 * 1024;
pub const METRIC_RENDER_TOTAL: &str = "snippetbox_render_total";
pub const METRIC_RENDER_MS: &str = "snippetbox_render_ms";

/// Terminal state of a single render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed,
    FailedBeforeFlush,
    FailedAfterFlush,
    Abandoned,
}

impl RenderOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::FailedBeforeFlush => "failed_before_flush",
            Self::FailedAfterFlush => "failed_after_flush",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Response extension naming the page the dispatcher rendered, or tried to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage(pub String);

#[derive(Clone)]
pub struct RenderDispatcher {
    templates: Arc<TemplateCache>,
    flush_threshold: usize,
}

impl RenderDispatcher {
    pub fn new(templates: Arc<TemplateCache>, flush_threshold: NonZeroUsize) -> Self {
        Self {
            templates,
            flush_threshold: flush_threshold.get(),
        }
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Fail unless every page a route may ask for has been compiled.
    pub fn ensure_pages(&self, pages: &[&str]) -> Result<(), TemplateError> {
        pages
            .iter()
            .try_for_each(|page| self.templates.get(page).map(|_| ()))
    }

    pub async fn render(&self, page: &str, status: StatusCode, data: &TemplateData) -> Response {
        let mut response = self.dispatch(page, status, data).await;
        response
            .extensions_mut()
            .insert(RenderedPage(page.to_string()));
        response
    }

    async fn dispatch(&self, page: &str, status: StatusCode, data: &TemplateData) -> Response {
        let timer = RenderTimer::start();

        if let Err(err) = self.templates.get(page) {
            return fail_before_flush(err, timer);
        }

        let context = match Context::from_serialize(data) {
            Ok(context) => context,
            Err(source) => {
                let err = TemplateError::Bind {
                    page: page.to_string(),
                    source,
                };
                return fail_before_flush(err, timer);
            }
        };

        let templates = Arc::clone(&self.templates);
        let name = page.to_string();
        stream_render(
            page.to_string(),
            status,
            self.flush_threshold,
            timer,
            move |out| templates.get(&name)?.render_to(&context, out),
        )
        .await
    }
}

/// Run `execute` on the blocking pool and turn its output into a response.
///
/// The status and headers are committed only once the first chunk arrives.
pub(crate) async fn stream_render<F>(
    page: String,
    status: StatusCode,
    flush_threshold: usize,
    mut timer: RenderTimer,
    execute: F,
) -> Response
where
    F: FnOnce(&mut ChunkWriter) -> Result<(), TemplateError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(FRAME_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let mut writer = ChunkWriter::new(tx.clone(), flush_threshold);
        let frame = match execute(&mut writer) {
            Ok(()) => match writer.flush_buffer() {
                Ok(()) => Frame::Done,
                // Receiver is gone; nobody is left to tell.
                Err(_) => return,
            },
            Err(err) => Frame::Failed(err),
        };
        let _ = tx.blocking_send(frame);
    });

    let first = match rx.recv().await {
        Some(Frame::Chunk(bytes)) => bytes,
        Some(Frame::Done) => {
            timer.finish(RenderOutcome::Completed);
            return (status, [(CONTENT_TYPE, HTML_CONTENT_TYPE)]).into_response();
        }
        Some(Frame::Failed(err)) => return fail_before_flush(err, timer),
        None => {
            timer.finish(RenderOutcome::FailedBeforeFlush);
            return HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                format!("render task for `{page}` ended without output"),
            )
            .into_response();
        }
    };

    debug!(target = SOURCE, %page, "render flushed first chunk");

    let body = Body::from_stream(stream! {
        yield Ok::<Bytes, io::Error>(first);
        loop {
            match rx.recv().await {
                Some(Frame::Chunk(bytes)) => yield Ok(bytes),
                Some(Frame::Done) => {
                    timer.finish(RenderOutcome::Completed);
                    break;
                }
                Some(Frame::Failed(err)) => {
                    timer.finish(RenderOutcome::FailedAfterFlush);
                    let chain = error_chain(&err);
                    error!(
                        target = SOURCE,
                        %page,
                        error = %chain,
                        "render failed after output was flushed; aborting response"
                    );
                    yield Err(io::Error::other(chain));
                    break;
                }
                None => {
                    timer.finish(RenderOutcome::FailedAfterFlush);
                    error!(target = SOURCE, %page, "render task vanished mid-stream");
                    yield Err(io::Error::other("render task vanished mid-stream"));
                    break;
                }
            }
        }
    });

    (status, [(CONTENT_TYPE, HTML_CONTENT_TYPE)], body).into_response()
}

fn fail_before_flush(err: TemplateError, mut timer: RenderTimer) -> Response {
    timer.finish(RenderOutcome::FailedBeforeFlush);
    HttpError::from(err).into_response()
}

/// Measures one render from lookup to its terminal state.
///
/// Exactly one outcome is recorded per render. Dropping an unfinished timer
/// records [`RenderOutcome::Abandoned`].
pub(crate) struct RenderTimer {
    started_at: Instant,
    finished: bool,
}

impl RenderTimer {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Instant::now(),
            finished: false,
        }
    }

    fn finish(&mut self, outcome: RenderOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        counter!(METRIC_RENDER_TOTAL, "outcome" => outcome.as_str()).increment(1);
        histogram!(METRIC_RENDER_MS, "outcome" => outcome.as_str())
            .record(self.started_at.elapsed().as_secs_f64() * 1000.0);
    }
}

impl Drop for RenderTimer {
    fn drop(&mut self) {
        if !self.finished {
            debug!(target = SOURCE, "render abandoned before completion");
            self.finish(RenderOutcome::Abandoned);
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(inner) = current {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        current = inner.source();
    }
    message
}

enum Frame {
    Chunk(Bytes),
    Done,
    Failed(TemplateError),
}

/// Buffers render output and ships it to the response body in chunks.
pub(crate) struct ChunkWriter {
    tx: mpsc::Sender<Frame>,
    buffer: Vec<u8>,
    threshold: usize,
}

impl ChunkWriter {
    fn new(tx: mpsc::Sender<Frame>, threshold: usize) -> Self {
        Self {
            tx,
            buffer: Vec::with_capacity(threshold),
            threshold,
        }
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.threshold),
        ));
        self.tx
            .blocking_send(Frame::Chunk(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped"))
    }
}

impl io::Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.threshold {
            self.flush_buffer()?;
        }
        Ok(buf.len())
    }

    // Chunk boundaries follow the threshold only.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write, path::Path, time::Duration};

    use axum::body::to_bytes;
    use http_body_util::BodyExt;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use tempfile::TempDir;
    use time::macros::datetime;

    use super::*;
    use crate::{
        application::error::ErrorReport,
        domain::entities::SnippetRecord,
        presentation::templates::{TemplateLayout, compile},
    };

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(path, contents).expect("write template");
    }

    fn dispatcher(threshold: usize) -> (TempDir, RenderDispatcher) {
        let dir = TempDir::new().expect("tempdir");
        write(
            dir.path(),
            "base.html",
            "<html>{% block main %}{% endblock main %}<footer>{{ current_year }}</footer></html>",
        );
        fs::create_dir_all(dir.path().join("partials")).expect("partials dir");
        write(
            dir.path(),
            "pages/view.html",
            "{% extends \"base.html\" %}{% block main %}<h1>{{ snippet.title }}</h1>{% endblock main %}",
        );
        write(
            dir.path(),
            "pages/broken.html",
            "{% extends \"base.html\" %}{% block main %}{{ missing.field }}{% endblock main %}",
        );
        let cache = compile(&TemplateLayout::new(dir.path())).expect("compile");
        let threshold = NonZeroUsize::new(threshold).expect("non-zero threshold");
        (dir, RenderDispatcher::new(Arc::new(cache), threshold))
    }

    fn data() -> TemplateData {
        TemplateData::new(datetime!(2026-10-16 12:00 UTC)).with_snippet(SnippetRecord {
            id: 1,
            title: "O snail".to_string(),
            content: "Climb Mount Fuji".to_string(),
            created_at: datetime!(2026-10-16 12:00 UTC),
            expires_at: datetime!(2026-10-23 12:00 UTC),
        })
    }

    /// `(metric, outcome label, counter value or histogram sample count)`, sorted.
    fn recorded(snapshotter: &Snapshotter) -> Vec<(String, String, usize)> {
        let mut entries: Vec<_> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, value)| {
                let outcome = key
                    .key()
                    .labels()
                    .find(|label| label.key() == "outcome")
                    .map(|label| label.value().to_string())
                    .unwrap_or_default();
                let count = match value {
                    DebugValue::Counter(count) => count as usize,
                    DebugValue::Histogram(samples) => samples.len(),
                    _ => 0,
                };
                (key.key().name().to_string(), outcome, count)
            })
            .collect();
        entries.sort();
        entries
    }

    fn histogram_samples(snapshotter: &Snapshotter, metric: &str) -> Vec<f64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == metric)
            .flat_map(|(_, _, _, value)| match value {
                DebugValue::Histogram(samples) => {
                    samples.into_iter().map(|sample| sample.into_inner()).collect()
                }
                _ => Vec::new(),
            })
            .collect()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8")
    }

    #[tokio::test]
    async fn renders_page_with_requested_status() {
        let (_dir, dispatcher) = dispatcher(DEFAULT_FLUSH_THRESHOLD);

        let response = dispatcher.render("view.html", StatusCode::OK, &data()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).expect("content type"),
            HTML_CONTENT_TYPE
        );
        assert_eq!(
            response.extensions().get::<RenderedPage>(),
            Some(&RenderedPage("view.html".to_string()))
        );
        assert_eq!(
            body_text(response).await,
            "<html><h1>O snail</h1><footer>2026</footer></html>"
        );
    }

    #[tokio::test]
    async fn small_threshold_splits_output_without_changing_it() {
        let (_dir, dispatcher) = dispatcher(4);

        let response = dispatcher
            .render("view.html", StatusCode::NOT_FOUND, &data())
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_text(response).await,
            "<html><h1>O snail</h1><footer>2026</footer></html>"
        );
    }

    #[tokio::test]
    async fn unknown_page_is_internal_error() {
        let (_dir, dispatcher) = dispatcher(DEFAULT_FLUSH_THRESHOLD);

        let response = dispatcher.render("create.html", StatusCode::OK, &data()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .cloned()
            .expect("error report");
        assert!(report.messages[0].contains("create.html"));
        assert_eq!(body_text(response).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn failure_before_first_flush_is_clean_500() {
        let (_dir, dispatcher) = dispatcher(DEFAULT_FLUSH_THRESHOLD);

        let response = dispatcher.render("broken.html", StatusCode::OK, &data()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn failure_after_first_flush_aborts_body() {
        let response = stream_render(
            "partial.html".to_string(),
            StatusCode::OK,
            4,
            RenderTimer::start(),
            |out| {
                out.write_all(b"<html><body>").expect("buffered write");
                Err(TemplateError::cache_miss("partial.html"))
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let mut body = response.into_body();
        let first = body
            .frame()
            .await
            .expect("first frame")
            .expect("first chunk")
            .into_data()
            .expect("data frame");
        assert_eq!(&first[..], b"<html><body>");

        let mut aborted = false;
        while let Some(frame) = body.frame().await {
            if frame.is_err() {
                aborted = true;
                break;
            }
        }
        assert!(aborted, "body stream should end with an error");
    }

    #[tokio::test]
    async fn same_failure_below_threshold_never_reaches_client() {
        let response = stream_render(
            "partial.html".to_string(),
            StatusCode::OK,
            1024,
            RenderTimer::start(),
            |out| {
                out.write_all(b"<html><body>").expect("buffered write");
                Err(TemplateError::cache_miss("partial.html"))
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn empty_output_completes_with_empty_body() {
        let response = stream_render(
            "empty.html".to_string(),
            StatusCode::OK,
            4,
            RenderTimer::start(),
            |_| Ok(()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn completed_render_records_one_outcome() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);
        let (_dir, dispatcher) = dispatcher(4);

        let response = dispatcher.render("view.html", StatusCode::OK, &data()).await;
        body_text(response).await;

        assert_eq!(
            recorded(&snapshotter),
            vec![
                (METRIC_RENDER_MS.to_string(), "completed".to_string(), 1),
                (METRIC_RENDER_TOTAL.to_string(), "completed".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn render_duration_starts_before_execution() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let timer = RenderTimer::start();
        std::thread::sleep(Duration::from_millis(20));
        let response =
            stream_render("slow.html".to_string(), StatusCode::OK, 4, timer, |_| Ok(())).await;
        body_text(response).await;

        let samples = histogram_samples(&snapshotter, METRIC_RENDER_MS);
        assert_eq!(samples.len(), 1);
        assert!(samples[0] >= 20.0, "duration {} ms", samples[0]);
    }

    #[tokio::test]
    async fn dropped_body_records_abandoned_render() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let response = stream_render(
            "long.html".to_string(),
            StatusCode::OK,
            4,
            RenderTimer::start(),
            |out| {
                for _ in 0..64 {
                    if out.write_all(b"<p>chunk</p>").is_err() {
                        break;
                    }
                }
                Ok(())
            },
        )
        .await;

        let mut body = response.into_body();
        body.frame()
            .await
            .expect("first frame")
            .expect("first chunk");
        drop(body);

        assert_eq!(
            recorded(&snapshotter),
            vec![
                (METRIC_RENDER_MS.to_string(), "abandoned".to_string(), 1),
                (METRIC_RENDER_TOTAL.to_string(), "abandoned".to_string(), 1),
            ]
        );
    }

    #[test]
    fn ensure_pages_reports_first_missing_page() {
        let (_dir, dispatcher) = dispatcher(DEFAULT_FLUSH_THRESHOLD);

        assert!(dispatcher.ensure_pages(&["view.html", "broken.html"]).is_ok());
        let err = dispatcher
            .ensure_pages(&["view.html", "home.html"])
            .expect_err("home.html is not compiled");
        assert!(matches!(err, TemplateError::CacheMiss { ref page } if page == "home.html"));
    }
}
