use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::pipeline::{conduit, terminate};
use crate::{AudioError, Tool};

/// Extractor wrapper around yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlp {
    yt_dlp_path: String,
    title_timeout: Duration,
    output_limit: usize,
}

impl YtDlp {
    pub fn new(yt_dlp_path: impl Into<String>, title_timeout: Duration) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            title_timeout,
            output_limit: 64 * 1024,
        }
    }

    /// Cap on the title probe's captured stdout and stderr
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    pub fn program(&self) -> &str {
        &self.yt_dlp_path
    }

    fn title_command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args([
            "--no-playlist",
            "--print",
            "%(title)s",
            "--no-warnings",
            url,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }

    /// Command that writes the best audio-only stream to stdout.
    ///
    /// No `-x`: the audio is transcoded by a separate ffmpeg process.
    pub fn stream_command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args([
            "--no-playlist",
            "-f",
            "bestaudio",
            "--no-warnings",
            "-o",
            "-",
            url,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }

    /// Fetch the video title without downloading the media.
    ///
    /// Callers treat failures as non-fatal and fall back to a default name.
    pub async fn fetch_title(&self, url: &str) -> Result<String, AudioError> {
        tracing::debug!("Fetching title for: {}", url);

        let mut child = self
            .title_command(url)
            .spawn()
            .map_err(|source| AudioError::Start {
                tool: Tool::Extractor,
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child, Tool::Extractor).await;
            return Err(AudioError::Io(std::io::Error::other(
                "child stdio was not captured",
            )));
        };

        let limit = self.output_limit;
        let finished = tokio::time::timeout(self.title_timeout, async {
            tokio::join!(
                child.wait(),
                conduit::capture_text(stdout, limit),
                conduit::capture_text(stderr, limit),
            )
        })
        .await;

        let Ok((status, title, stderr)) = finished else {
            terminate(&mut child, Tool::Extractor).await;
            return Err(AudioError::TitleTimeout(self.title_timeout));
        };

        let status = status.map_err(|source| AudioError::Wait {
            tool: Tool::Extractor,
            source,
        })?;
        if !status.success() {
            return Err(AudioError::TitleFailed { status, stderr });
        }

        Ok(title)
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp", Duration::from_secs(30))
    }
}
