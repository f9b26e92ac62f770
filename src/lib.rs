//! ytgrab: a small web backend that lists the formats of a video and streams
//! the chosen one back, plus a client that drives the same two requests.

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod link;
pub mod logging;
pub mod retry;
pub mod server;
pub mod yt_dlp;
