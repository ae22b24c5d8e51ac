use async_trait::async_trait;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio_util::sync::CancellationToken;

pub mod conduit;

use crate::config::Config;
use crate::extractors::YtDlp;
use crate::transcode::Ffmpeg;
use crate::{AudioError, Tool};

/// Byte sink the pipeline streams MP3 into
pub type Sink<'a> = dyn AsyncWrite + Unpin + Send + 'a;

/// Source of titles and MP3 streams for a video URL
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Title of the video, without downloading the media
    async fn fetch_title(&self, url: &str) -> Result<String, AudioError>;

    /// Stream the audio of `url` as MP3 into `sink`, returning the bytes written.
    ///
    /// Every child process is reaped before this returns, including when
    /// `cancel` fires or the deadline elapses.
    async fn stream_mp3(
        &self,
        url: &str,
        sink: &mut Sink<'_>,
        cancel: CancellationToken,
    ) -> Result<u64, AudioError>;
}

/// yt-dlp piped into ffmpeg
#[derive(Debug, Clone)]
pub struct StreamPipeline {
    extractor: YtDlp,
    transcoder: Ffmpeg,
    timeout: Duration,
    stderr_limit: usize,
}

enum Outcome {
    Finished {
        extractor: (std::io::Result<ExitStatus>, String),
        transcoder: (std::io::Result<ExitStatus>, String),
        delivered: std::io::Result<u64>,
    },
    TimedOut,
    Cancelled,
}

struct Pipes {
    extractor_out: ChildStdout,
    extractor_err: ChildStderr,
    transcoder_in: ChildStdin,
    transcoder_out: ChildStdout,
    transcoder_err: ChildStderr,
}

impl Pipes {
    fn take(extractor: &mut Child, transcoder: &mut Child) -> Option<Self> {
        Some(Self {
            extractor_out: extractor.stdout.take()?,
            extractor_err: extractor.stderr.take()?,
            transcoder_in: transcoder.stdin.take()?,
            transcoder_out: transcoder.stdout.take()?,
            transcoder_err: transcoder.stderr.take()?,
        })
    }
}

impl StreamPipeline {
    pub fn new(extractor: YtDlp, transcoder: Ffmpeg, timeout: Duration) -> Self {
        Self {
            extractor,
            transcoder,
            timeout,
            stderr_limit: 64 * 1024,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let extractor = YtDlp::new(&config.tools.extractor, config.title_timeout())
            .with_output_limit(config.limits.stderr_limit_bytes);
        let transcoder = Ffmpeg::new(&config.tools.transcoder);

        Self::new(extractor, transcoder, config.pipeline_timeout())
            .with_stderr_limit(config.limits.stderr_limit_bytes)
    }

    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run yt-dlp | ffmpeg into `sink`.
    ///
    /// The conduit between the two children is closed only once yt-dlp has
    /// been reaped, so ffmpeg never sees a premature end of input.
    pub async fn run(
        &self,
        url: &str,
        sink: &mut Sink<'_>,
        cancel: CancellationToken,
    ) -> Result<u64, AudioError> {
        let mut extractor =
            self.extractor
                .stream_command(url)
                .spawn()
                .map_err(|source| AudioError::Start {
                    tool: Tool::Extractor,
                    source,
                })?;

        let mut transcoder = match self.transcoder.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                terminate(&mut extractor, Tool::Extractor).await;
                return Err(AudioError::Start {
                    tool: Tool::Transcoder,
                    source,
                });
            }
        };

        let Some(pipes) = Pipes::take(&mut extractor, &mut transcoder) else {
            terminate(&mut extractor, Tool::Extractor).await;
            terminate(&mut transcoder, Tool::Transcoder).await;
            return Err(AudioError::Io(std::io::Error::other(
                "child stdio was not captured",
            )));
        };
        let Pipes {
            extractor_out,
            extractor_err,
            transcoder_in,
            transcoder_out,
            transcoder_err,
        } = pipes;

        tracing::debug!(
            extractor = self.extractor.program(),
            transcoder = self.transcoder.program(),
            "pipeline started for {}",
            url
        );

        let limit = self.stderr_limit;
        let outcome = {
            let upstream = async {
                let (status, (pumped, stdin), stderr) = tokio::join!(
                    extractor.wait(),
                    conduit::pump(extractor_out, transcoder_in),
                    conduit::capture_text(extractor_err, limit),
                );
                if let Err(e) = pumped {
                    tracing::debug!("conduit closed early: {}", e);
                }
                conduit::close(stdin).await;
                (status, stderr)
            };

            let downstream = async {
                let (delivered, status, stderr) = tokio::join!(
                    conduit::deliver(transcoder_out, sink),
                    transcoder.wait(),
                    conduit::capture_text(transcoder_err, limit),
                );
                (delivered, (status, stderr))
            };

            tokio::select! {
                (up, (delivered, down)) = async { tokio::join!(upstream, downstream) } => {
                    Outcome::Finished { extractor: up, transcoder: down, delivered }
                }
                _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
                _ = cancel.cancelled() => Outcome::Cancelled,
            }
        };

        match outcome {
            Outcome::Finished {
                extractor,
                transcoder,
                delivered,
            } => {
                check_exit(Tool::Extractor, extractor)?;
                check_exit(Tool::Transcoder, transcoder)?;
                Ok(delivered?)
            }
            Outcome::TimedOut => {
                tracing::warn!("pipeline for {} exceeded {}s, killing", url, self.timeout.as_secs());
                terminate(&mut extractor, Tool::Extractor).await;
                terminate(&mut transcoder, Tool::Transcoder).await;
                Err(AudioError::TimedOut(self.timeout))
            }
            Outcome::Cancelled => {
                tracing::info!("pipeline for {} cancelled, killing", url);
                terminate(&mut extractor, Tool::Extractor).await;
                terminate(&mut transcoder, Tool::Transcoder).await;
                Err(AudioError::Cancelled)
            }
        }
    }
}

fn check_exit(
    tool: Tool,
    (status, stderr): (std::io::Result<ExitStatus>, String),
) -> Result<(), AudioError> {
    let status = status.map_err(|source| AudioError::Wait { tool, source })?;
    if status.success() {
        Ok(())
    } else {
        Err(AudioError::ToolFailed {
            tool,
            status,
            stderr,
        })
    }
}

/// Kill a child and reap it
pub(crate) async fn terminate(child: &mut Child, tool: Tool) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("{} already exited: {}", tool, e);
    }
    if let Err(e) = child.wait().await {
        tracing::warn!("failed to reap {}: {}", tool, e);
    }
}

#[async_trait]
impl AudioSource for StreamPipeline {
    async fn fetch_title(&self, url: &str) -> Result<String, AudioError> {
        self.extractor.fetch_title(url).await
    }

    async fn stream_mp3(
        &self,
        url: &str,
        sink: &mut Sink<'_>,
        cancel: CancellationToken,
    ) -> Result<u64, AudioError> {
        self.run(url, sink, cancel).await
    }
}
