use std::{path::Path, sync::Arc};

use axum::{
    Form, Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_http::{
    compression::{
        CompressionLayer,
        predicate::{DefaultPredicate, NotForContentType, Predicate},
    },
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::ServeArgs,
    error::GrabError,
    format::{FormatKind, FormatsResponse},
    link::{clean_url, content_disposition},
    retry::RetryPolicy,
    yt_dlp::{Extractor, YtDlp},
};

pub struct AppState {
    pub extractor: Arc<dyn Extractor>,
    pub retry: RetryPolicy,
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let extractor = YtDlp::new(args.yt_dlp.clone(), args.throttle());
    let state = Arc::new(AppState {
        extractor: Arc::new(extractor),
        retry: args.retry_policy(),
    });

    let app = router(state, &args.static_dir);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let serve_app =
        ServeDir::new(static_dir).not_found_service(ServeFile::new(static_dir.join("index.html")));

    // media payloads are already compressed
    let compress = DefaultPredicate::new()
        .and(NotForContentType::new("video/"))
        .and(NotForContentType::new("audio/"));

    Router::new()
        .route("/get_formats", post(get_formats_handler))
        .route("/download", post(download_handler))
        .fallback_service(serve_app)
        .layer(CompressionLayer::new().compress_when(compress))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Empty values and anything `yt-dlp` could read as an option are refused.
fn is_link(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && !url.starts_with('-')
}

#[derive(Deserialize)]
struct FormatsPayload {
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
struct DownloadPayload {
    #[serde(default)]
    url: String,
    #[serde(default)]
    itag: String,
    #[serde(default, rename = "type")]
    kind: String,
}

async fn get_formats_handler(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<FormatsPayload>,
) -> Result<Json<FormatsResponse>, AppError> {
    if !is_link(&payload.url) {
        return Err(AppError::new(GrabError::MissingUrl, "Failed to fetch video"));
    }

    let url = clean_url(payload.url.trim());
    info!("fetching formats for {url}");

    let extractor = state.extractor.as_ref();
    let link = url.as_str();
    let video = state
        .retry
        .run(|| extractor.probe(link))
        .await
        .map_err(|e| AppError::new(e, "Failed to fetch video"))?;

    info!("{} formats for {}", video.formats.len(), video.title);
    Ok(Json(FormatsResponse {
        error: None,
        title: Some(video.title),
        formats: Some(video.formats),
    }))
}

async fn download_handler(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<DownloadPayload>,
) -> Result<Response, AppError> {
    let context = "Failed to download video";
    if !is_link(&payload.url) || payload.itag.trim().is_empty() {
        return Err(AppError::new(GrabError::MissingParams, context));
    }

    let url = clean_url(payload.url.trim());
    let kind = FormatKind::from_form(&payload.kind);
    info!("download requested for {url} (itag {}, {kind})", payload.itag);

    let extractor = state.extractor.as_ref();
    let link = url.as_str();
    let itag = payload.itag.trim();
    let media = state
        .retry
        .run(|| extractor.fetch(link, itag, kind))
        .await
        .map_err(|e| AppError::new(e, context))?;

    let file = tokio::fs::File::open(&media.path)
        .await
        .map_err(|e| AppError::new(e.into(), context))?;

    // the work dir goes away once the body has been sent or dropped
    let workdir = media.workdir;
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _ = &workdir;
        chunk
    });

    Ok((
        [
            (header::CONTENT_TYPE, media.kind.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&media.filename),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(err: GrabError, context: &str) -> Self {
        let status = match &err {
            GrabError::RetriesExhausted => StatusCode::TOO_MANY_REQUESTS,
            GrabError::MissingUrl | GrabError::MissingParams => StatusCode::BAD_REQUEST,
            e if e.is_extractor_failure() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if err.is_extractor_failure() {
            format!("{context}: {err}")
        } else {
            err.to_string()
        };
        Self { status, message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("request failed ({}): {}", self.status, self.message);
        (self.status, Json(FormatsResponse::error(self.message))).into_response()
    }
}
