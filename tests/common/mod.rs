#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::BoxFuture;
use ytgrab::{
    error::GrabError,
    format::{FormatKind, FormatRecord, Itag},
    link::download_filename,
    retry::RetryPolicy,
    server::{AppState, router},
    yt_dlp::{Extractor, Media, VideoInfo},
};

pub const TITLE: &str = "Big Buck Bunny";

/// Extractor that replays scripted results and records what it was asked for.
#[derive(Default)]
pub struct FakeExtractor {
    probe_results: Mutex<VecDeque<Result<VideoInfo, GrabError>>>,
    fetch_results: Mutex<VecDeque<Result<Vec<u8>, GrabError>>>,
    pub probe_calls: Mutex<Vec<String>>,
    pub fetch_calls: Mutex<Vec<(String, String, FormatKind)>>,
    workdirs: Mutex<Vec<PathBuf>>,
    title: Option<String>,
}

impl FakeExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_title(title: &str) -> Arc<Self> {
        Arc::new(Self {
            title: Some(title.to_string()),
            ..Default::default()
        })
    }

    pub fn push_probe(&self, result: Result<VideoInfo, GrabError>) {
        self.probe_results.lock().unwrap().push_back(result);
    }

    pub fn push_fetch(&self, result: Result<Vec<u8>, GrabError>) {
        self.fetch_results.lock().unwrap().push_back(result);
    }

    pub fn probe_calls(&self) -> Vec<String> {
        self.probe_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> Vec<(String, String, FormatKind)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    /// Work dirs of every media handed out so far.
    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.workdirs.lock().unwrap().clone()
    }
}

impl Extractor for FakeExtractor {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<VideoInfo, GrabError>> {
        self.probe_calls.lock().unwrap().push(url.to_string());
        let result = self
            .probe_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GrabError::Extract("nothing scripted".into())));
        Box::pin(async move { result })
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
        itag: &'a str,
        kind: FormatKind,
    ) -> BoxFuture<'a, Result<Media, GrabError>> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((url.to_string(), itag.to_string(), kind));
        let result = self
            .fetch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GrabError::Extract("nothing scripted".into())));
        let title = self.title.clone().unwrap_or_else(|| TITLE.to_string());
        Box::pin(async move {
            let payload = result?;
            let workdir = tempfile::tempdir()?;
            self.workdirs
                .lock()
                .unwrap()
                .push(workdir.path().to_path_buf());
            let path = workdir.path().join(format!("media.{}", kind.extension()));
            tokio::fs::write(&path, payload).await?;
            Ok(Media {
                filename: download_filename(&title, kind),
                kind,
                path,
                workdir,
            })
        })
    }
}

pub fn video(itags: &[(&str, FormatKind)]) -> VideoInfo {
    let formats = itags
        .iter()
        .enumerate()
        .map(|(i, (itag, kind))| FormatRecord {
            itag: Itag(itag.to_string()),
            kind: *kind,
            resolution: match kind {
                FormatKind::Video => format!("{}p", 1080 / (i + 1)),
                FormatKind::Audio => "MP3 128kbps".to_string(),
            },
            size: format!("{}.00 MB", i + 1),
            fps: None,
        })
        .collect();
    VideoInfo {
        title: TITLE.to_string(),
        formats,
    }
}

pub fn state(fake: Arc<FakeExtractor>) -> Arc<AppState> {
    Arc::new(AppState {
        extractor: fake,
        retry: RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        },
    })
}

pub fn app(fake: Arc<FakeExtractor>) -> axum::Router {
    router(state(fake), Path::new("static"))
}

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn spawn(fake: Arc<FakeExtractor>) -> String {
    serve(app(fake)).await
}
