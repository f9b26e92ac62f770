use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use futures::future::BoxFuture;
use glob::{Pattern, glob};
use serde::Deserialize;
use tempfile::TempDir;
use tokio::{process::Command, time::sleep};
use tracing::{debug, error, info};

use crate::{
    error::GrabError,
    format::{FormatKind, FormatRecord, Itag, Selector, human_size},
    link::download_filename,
};

#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub title: String,
    pub formats: Vec<FormatRecord>,
}

/// A finished download. The file lives inside `workdir`, which is removed
/// when this value (or whatever took ownership of `workdir`) is dropped.
#[derive(Debug)]
pub struct Media {
    pub filename: String,
    pub kind: FormatKind,
    pub path: PathBuf,
    pub workdir: TempDir,
}

pub trait Extractor: Send + Sync {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<VideoInfo, GrabError>>;

    fn fetch<'a>(
        &'a self,
        url: &'a str,
        itag: &'a str,
        kind: FormatKind,
    ) -> BoxFuture<'a, Result<Media, GrabError>>;
}

pub struct YtDlp {
    binary_path: PathBuf,
    throttle: Duration,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self {
            binary_path: "yt-dlp".into(),
            throttle: Duration::from_secs(5),
        }
    }
}

impl YtDlp {
    pub fn new(binary_path: PathBuf, throttle: Duration) -> Self {
        Self {
            binary_path,
            throttle,
        }
    }

    async fn run(&self, command: &mut Command) -> Result<String, GrabError> {
        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("yt-dlp failed ({}): {}", output.status, stderr.trim());
            return Err(GrabError::from_stderr(&stderr));
        }

        if !self.throttle.is_zero() {
            sleep(self.throttle).await;
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn get_json(&self, link: &str) -> Result<JsonDump, GrabError> {
        let json = self
            .run(
                Command::new(&self.binary_path)
                    .arg("--no-playlist")
                    .arg("--skip-download")
                    .arg("--dump-json")
                    .arg("--")
                    .arg(link),
            )
            .await?;
        Ok(serde_json::from_str::<JsonDump>(&json)?)
    }

    async fn download(&self, link: &str, itag: &str, kind: FormatKind) -> Result<Media, GrabError> {
        let workdir = tempfile::tempdir()?;
        let template = workdir.path().join("media.%(ext)s");
        info!("starting download {link} (itag {itag}, {kind})");

        let mut command = Command::new(&self.binary_path);
        command
            .arg("--no-playlist")
            .arg("-f")
            .arg(Selector::for_download(itag, kind))
            .arg("--print")
            .arg("title")
            .arg("--no-simulate")
            .arg("-o")
            .arg(&template);
        match kind {
            FormatKind::Audio => command
                .arg("-x")
                .arg("--audio-format")
                .arg("mp3")
                .arg("--audio-quality")
                .arg("2"),
            FormatKind::Video => command.arg("--merge-output-format").arg("mp4"),
        };
        command.arg("--").arg(link);

        let stdout = self.run(&mut command).await?;
        let title = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("video")
            .trim()
            .to_string();

        let path = find_output(workdir.path(), kind)?;
        info!("download success {link} -> {}", path.display());

        Ok(Media {
            filename: download_filename(&title, kind),
            kind,
            path,
            workdir,
        })
    }
}

impl Extractor for YtDlp {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<VideoInfo, GrabError>> {
        Box::pin(async move {
            let dump = self.get_json(url).await?;
            let formats = collect_formats(&dump.formats);
            debug!("{} formats offered for {url}", formats.len());
            Ok(VideoInfo {
                title: dump.title,
                formats,
            })
        })
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
        itag: &'a str,
        kind: FormatKind,
    ) -> BoxFuture<'a, Result<Media, GrabError>> {
        Box::pin(self.download(url, itag, kind))
    }
}

/// Picks the produced file out of the work dir, preferring the extension the
/// kind asks for.
fn find_output(dir: &Path, kind: FormatKind) -> Result<PathBuf, GrabError> {
    let pattern = format!(
        "{}/media.*",
        Pattern::escape(&dir.to_string_lossy())
    );

    let mut path = None;
    for p in glob(&pattern)? {
        match p {
            Ok(p) => {
                let matches_kind = p.extension().is_some_and(|ext| ext == kind.extension());
                if matches_kind || path.is_none() {
                    path = Some(p);
                }
            }
            Err(e) => error!("glob error: {e}"),
        }
    }

    path.ok_or_else(|| GrabError::Extract("yt-dlp produced no output file".into()))
}

/// Videos first (mp4 only, one per resolution, tallest first), then audio-only
/// streams by bitrate.
pub fn collect_formats(formats: &[DumpFormat]) -> Vec<FormatRecord> {
    // yt-dlp lists formats worst to best; reversing first makes the stable
    // sorts below prefer the better stream within a tie.
    let mut videos: Vec<&DumpFormat> = formats
        .iter()
        .rev()
        .filter(|f| f.has_video() && f.ext == "mp4" && f.height.is_some())
        .collect();
    videos.sort_by(|a, b| b.height.cmp(&a.height));

    let mut audios: Vec<&DumpFormat> = formats.iter().rev().filter(|f| f.is_audio_only()).collect();
    audios.sort_by(|a, b| b.abr.unwrap_or(0.0).total_cmp(&a.abr.unwrap_or(0.0)));

    let mut records = vec![];
    for format in videos {
        let resolution = format!("{}p", format.height.unwrap_or_default());
        if records.iter().any(|r: &FormatRecord| r.resolution == resolution) {
            continue;
        }
        records.push(FormatRecord {
            itag: Itag(format.format_id.clone()),
            kind: FormatKind::Video,
            resolution,
            size: human_size(format.size()),
            fps: format.fps,
        });
    }

    for format in audios {
        let resolution = match format.abr {
            Some(abr) => format!("MP3 {abr:.0}kbps"),
            None => "MP3 Audio".to_string(),
        };
        records.push(FormatRecord {
            itag: Itag(format.format_id.clone()),
            kind: FormatKind::Audio,
            resolution,
            size: human_size(format.size()),
            fps: None,
        });
    }

    records
}

#[derive(Deserialize)]
struct JsonDump {
    title: String,
    #[serde(default)]
    formats: Vec<DumpFormat>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DumpFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub abr: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl DumpFormat {
    fn has_codec(codec: &Option<String>) -> bool {
        codec.as_deref().is_some_and(|c| c != "none")
    }

    fn has_video(&self) -> bool {
        Self::has_codec(&self.vcodec)
    }

    fn is_audio_only(&self) -> bool {
        !self.has_video() && Self::has_codec(&self.acodec)
    }

    fn size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx).map(|bytes| bytes as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes a stand-in `yt-dlp` that records its argv next to itself.
    #[cfg(unix)]
    fn fake_binary(dir: &Path, stdout: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > \"$0.args\"\ncat <<'JSON'\n{stdout}\nJSON\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn links_are_never_parsed_as_options() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_binary(dir.path(), r#"{"title": "t", "formats": []}"#);
        let yt_dlp = YtDlp::new(binary.clone(), Duration::ZERO);

        let info = yt_dlp.probe("--batch-file=/etc/passwd").await.unwrap();
        assert_eq!(info.title, "t");

        let args = std::fs::read_to_string(binary.with_extension("args")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(&args[args.len() - 2..], &["--", "--batch-file=/etc/passwd"]);
    }

    const DUMP: &str = r#"{
        "title": "Big Buck Bunny",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
            {"format_id": "139", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.5", "abr": 48.8, "filesize": 1048576},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 130.2},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "filesize_approx": 2097152},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "fps": 25},
            {"format_id": "134", "ext": "mp4", "vcodec": "avc1.4d401e", "acodec": "none", "height": 360, "fps": 25},
            {"format_id": "243", "ext": "webm", "vcodec": "vp9", "acodec": "none", "height": 360},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "fps": 25, "filesize": 13107200}
        ]
    }"#;

    #[test]
    fn formats_are_collected_in_display_order() {
        let dump: JsonDump = serde_json::from_str(DUMP).unwrap();
        let records = collect_formats(&dump.formats);
        let summary: Vec<(String, String, String)> = records
            .iter()
            .map(|r| (r.itag.0.clone(), r.resolution.clone(), r.size.clone()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("137".into(), "1080p".into(), "12.50 MB".into()),
                ("134".into(), "360p".into(), "Unknown".into()),
                ("251".into(), "MP3 130kbps".into(), "Unknown".into()),
                ("140".into(), "MP3 130kbps".into(), "2.00 MB".into()),
                ("139".into(), "MP3 49kbps".into(), "1.00 MB".into()),
            ]
        );
        assert_eq!(records[0].kind, FormatKind::Video);
        assert_eq!(records[0].fps, Some(25.0));
        assert_eq!(records[4].kind, FormatKind::Audio);
    }

    #[test]
    fn output_file_prefers_requested_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("media.m4a"), b"a").unwrap();
        std::fs::write(dir.path().join("media.mp3"), b"b").unwrap();
        let path = find_output(dir.path(), FormatKind::Audio).unwrap();
        assert_eq!(path.file_name().unwrap(), "media.mp3");
    }

    #[test]
    fn empty_workdir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_output(dir.path(), FormatKind::Video),
            Err(GrabError::Extract(_))
        ));
    }
}
