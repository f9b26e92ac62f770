use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::retry::RetryPolicy;

/// Fetch video formats from a ytgrab backend and download them.
#[derive(Parser, Debug)]
#[command(name = "ytgrab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the backend and the download page
    Serve(ServeArgs),
    /// List the formats of a video and optionally download one
    Get(GetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "YTGRAB_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Directory holding index.html and script.js
    #[arg(long, env = "YTGRAB_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// yt-dlp executable
    #[arg(long = "yt-dlp", env = "YTGRAB_YT_DLP", default_value = "yt-dlp")]
    pub yt_dlp: PathBuf,

    /// Extractor attempts per request when rate limited
    #[arg(long, env = "YTGRAB_ATTEMPTS", default_value_t = 3)]
    pub attempts: u32,

    /// Seconds to wait before retrying after a rate limit
    #[arg(long, env = "YTGRAB_RETRY_DELAY", default_value_t = 10)]
    pub retry_delay: u64,

    /// Seconds to pause after every extractor call
    #[arg(long, env = "YTGRAB_THROTTLE", default_value_t = 5)]
    pub throttle: u64,
}

impl ServeArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.retry_delay),
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle)
    }
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Video URL
    pub url: String,

    /// Base URL of the backend
    #[arg(long, env = "YTGRAB_SERVER", default_value = "http://127.0.0.1:5000")]
    pub server: String,

    /// Download the format at this position in the list (1-based)
    #[arg(short, long)]
    pub pick: Option<usize>,

    /// Where downloaded files are written
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,
}
