use std::{
    fmt::Write as _,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::bail;
use futures::StreamExt;
use reqwest::{
    Client, Url,
    header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap},
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::format::{FormatKind, FormatsResponse, Itag};

pub const GENERIC_ERROR: &str = "An error occurred. Please try again.";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One rendered format: its label and the itag/type its download control
/// sends back.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub label: String,
    pub itag: Itag,
    pub kind: FormatKind,
}

/// What the user currently sees.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub url: String,
    pub error: String,
    pub title: String,
    pub video_info: bool,
    pub formats: Vec<ListItem>,
    pub loading: bool,
}

impl Page {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.loading {
            out.push_str("Downloading...\n");
        }
        if !self.error.is_empty() {
            let _ = writeln!(out, "Error: {}", self.error);
        }
        if self.video_info {
            let _ = writeln!(out, "{}", self.title);
            for (i, item) in self.formats.iter().enumerate() {
                let _ = writeln!(out, "{:>3}. {} [Download]", i + 1, item.label);
            }
        }
        out
    }
}

pub struct FormHandler {
    client: Client,
    base: Url,
    out_dir: PathBuf,
    page: Page,
}

impl FormHandler {
    pub fn new(base: &str, out_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        // endpoints are joined relative to the base, so it has to end in `/`
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
            out_dir: out_dir.into(),
            page: Page::default(),
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Submits `url` and replaces the list with whatever the backend offers.
    pub async fn submit(&mut self, url: &str) {
        self.page.url = url.to_string();
        self.page.error.clear();
        self.page.video_info = false;
        self.page.formats.clear();
        self.page.loading = false;

        let response = match self.fetch_formats(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("get_formats failed: {e:#}");
                self.page.error = GENERIC_ERROR.to_string();
                return;
            }
        };

        if let Some(error) = response.error.filter(|e| !e.is_empty()) {
            self.page.error = error;
            return;
        }

        let Some(formats) = response.formats else {
            warn!("get_formats response carried no formats");
            self.page.error = GENERIC_ERROR.to_string();
            return;
        };

        self.page.title = response.title.unwrap_or_default();
        self.page.formats = formats
            .into_iter()
            .map(|format| ListItem {
                label: format.label(),
                itag: format.itag,
                kind: format.kind,
            })
            .collect();
        self.page.video_info = true;
        debug!("rendered {} formats", self.page.formats.len());
    }

    /// Activates the download control at `index`. Returns the saved file, or
    /// `None` when there is no such control or the download failed (the
    /// failure is shown on the page).
    pub async fn download(&mut self, index: usize) -> Option<PathBuf> {
        let item = self.page.formats.get(index)?.clone();

        self.page.error.clear();
        self.page.loading = true;

        let saved = match self.fetch_download(&item).await {
            Ok(path) => {
                info!("saved {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("download of itag {} failed: {e:#}", item.itag);
                self.page.error = e.to_string();
                None
            }
        };

        self.page.loading = false;
        saved
    }

    async fn fetch_formats(&self, url: &str) -> anyhow::Result<FormatsResponse> {
        let body = serde_urlencoded::to_string([("url", url)])?;
        let response = self
            .client
            .post(self.base.join("get_formats")?)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        Ok(response.json::<FormatsResponse>().await?)
    }

    async fn fetch_download(&self, item: &ListItem) -> anyhow::Result<PathBuf> {
        let body = serde_urlencoded::to_string([
            ("url", self.page.url.as_str()),
            ("itag", item.itag.0.as_str()),
            ("type", item.kind.as_str()),
        ])?;
        let response = self
            .client
            .post(self.base.join("download")?)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Download failed");
        }

        let name = attachment_name(response.headers())
            .unwrap_or_else(|| format!("video_{}.mp4", item.itag));
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let path = self.out_dir.join(name);

        // the partial file is deleted on drop unless it gets persisted below
        let partial = tempfile::Builder::new()
            .prefix(".ytgrab-")
            .suffix(".part")
            .tempfile_in(&self.out_dir)?;
        let mut file = File::from_std(partial.as_file().try_clone()?);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);

        if let Err(e) = partial.persist_noclobber(&path) {
            if e.error.kind() == ErrorKind::AlreadyExists {
                bail!("{} already exists", path.display());
            }
            return Err(e.error.into());
        }

        Ok(path)
    }
}

/// File name from a `Content-Disposition: attachment` header, reduced to its
/// last path component. `filename*` wins over `filename`.
fn attachment_name(headers: &HeaderMap) -> Option<String> {
    let value = std::str::from_utf8(headers.get(CONTENT_DISPOSITION)?.as_bytes()).ok()?;

    let mut plain = None;
    let mut extended = None;
    for param in value.split(';') {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        let val = val.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                extended = val
                    .get(..7)
                    .filter(|charset| charset.eq_ignore_ascii_case("UTF-8''"))
                    .and_then(|_| urlencoding::decode(&val[7..]).ok())
                    .map(|name| name.into_owned());
            }
            "filename" => plain = Some(val.trim_matches('"').to_string()),
            _ => {}
        }
    }

    let name = extended.or(plain)?;
    let name = Path::new(&name).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}
