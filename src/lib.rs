//! yt-download-mp3 - stream the audio of a video URL as compact MP3
//!
//! The service runs an extractor (yt-dlp) and a transcoder (ffmpeg) as two
//! concurrent child processes and streams the transcoder's output straight
//! into the HTTP response body. Nothing is written to disk.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod pipeline;
pub mod server;
pub mod transcode;
pub mod utils;

use std::process::ExitStatus;
use std::time::Duration;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::YtDlp;
pub use pipeline::{AudioSource, StreamPipeline};
pub use transcode::Ffmpeg;

/// Result type used at the application edges
pub type Result<T> = anyhow::Result<T>;

/// The two external tools the pipeline drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Extractor,
    Transcoder,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Extractor => "yt-dlp",
            Tool::Transcoder => "ffmpeg",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while probing or streaming audio
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("could not start {tool}: {source}")]
    Start {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: Tool,
        status: ExitStatus,
        stderr: String,
    },

    #[error("waiting for {tool} failed: {source}")]
    Wait {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    #[error("title fetch failed ({status}): {stderr}")]
    TitleFailed { status: ExitStatus, stderr: String },

    #[error("title fetch timed out after {}s", .0.as_secs())]
    TitleTimeout(Duration),

    #[error("pipeline timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
