use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrabError {
    #[error("No URL provided")]
    MissingUrl,

    #[error("Missing parameters")]
    MissingParams,

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Extract(String),

    #[error("Max retries reached, please try again later")]
    RetriesExhausted,

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Glob(#[from] glob::PatternError),
}

impl GrabError {
    /// Errors that come back from the extractor itself, as opposed to local
    /// failures or bad requests.
    pub fn is_extractor_failure(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Unavailable(_) | Self::Extract(_)
        )
    }

    /// Classifies `yt-dlp` stderr output.
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr
            .lines()
            .rev()
            .find(|line| line.starts_with("ERROR:"))
            .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
            .unwrap_or("yt-dlp exited without output")
            .trim()
            .to_string();

        if stderr.contains("HTTP Error 429") || stderr.contains("Too Many Requests") {
            Self::RateLimited(message)
        } else if stderr.contains("Video unavailable") || stderr.contains("Private video") {
            Self::Unavailable(message)
        } else {
            Self::Extract(message)
        }
    }
}
