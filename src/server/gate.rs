//! Response gating: decide between an audio stream and a JSON error
//!
//! The pipeline runs on its own task and writes into an in-memory conduit.
//! The handler waits for the first chunk before choosing a status code, so a
//! download that fails before producing audio still gets a structured error.
//! Headers are sent exactly once, and only after audio has been observed.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use crate::pipeline::AudioSource;
use crate::utils::format_file_size;
use crate::AudioError;

/// Capacity of the in-memory conduit between the pipeline task and the body
const CONDUIT_CAPACITY: usize = 64 * 1024;

/// What a download should look like once it is handed to the gater
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub filename: String,
    pub peek_bytes: usize,
}

type PipelineResult = Result<u64, AudioError>;

/// Start the pipeline and gate the response on its first bytes
pub async fn respond(
    source: Arc<dyn AudioSource>,
    job: DownloadJob,
    cancel: CancellationToken,
) -> Result<Response, ApiError> {
    let (mut writer, mut reader) = tokio::io::duplex(CONDUIT_CAPACITY);
    let (result_tx, result_rx) = oneshot::channel::<PipelineResult>();

    let url = job.url.clone();
    let pipeline_cancel = cancel.clone();
    // Cancels the pipeline if the client goes away while we are still peeking.
    let peek_guard = cancel.drop_guard();
    tokio::spawn(async move {
        let result = source.stream_mp3(&url, &mut writer, pipeline_cancel).await;
        // Report before closing the conduit so end-of-stream always has a result.
        let _ = result_tx.send(result);
        drop(writer);
    });

    let mut staged = vec![0u8; job.peek_bytes];
    let n = match reader.read(&mut staged).await {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!("reading conduit: {}", e);
            0
        }
    };

    if n == 0 {
        drop(reader);
        let message = match result_rx.await {
            Ok(Err(e)) => e.to_string(),
            Ok(Ok(_)) | Err(_) => "download produced no output".to_string(),
        };
        tracing::error!("download failed for {}: {}", job.url, message);
        return Err(ApiError::Download {
            message,
            url: job.url,
        });
    }

    staged.truncate(n);
    let body = AudioBody {
        staged: Some(Bytes::from(staged)),
        rest: ReaderStream::new(reader),
        result: result_rx,
        cancel: peek_guard.disarm(),
        url: job.url,
        filename: job.filename.clone(),
        finished: false,
    };

    Ok(audio_response(&job.filename, Body::from_stream(body)))
}

fn audio_response(filename: &str, body: Body) -> Response {
    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", filename).as_bytes(),
    )
    .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"audio.mp3\""));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg")),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        body,
    )
        .into_response()
}

/// Response body: the staged first chunk, then the rest of the conduit.
///
/// Dropping it before the end (client gone, write error, server shutdown)
/// cancels the pipeline so both children are killed.
struct AudioBody {
    staged: Option<Bytes>,
    rest: ReaderStream<DuplexStream>,
    result: oneshot::Receiver<PipelineResult>,
    cancel: CancellationToken,
    url: String,
    filename: String,
    finished: bool,
}

impl AudioBody {
    fn report(&mut self) {
        match self.result.try_recv() {
            Ok(Ok(bytes)) => {
                tracing::info!(
                    "download complete: {} ({})",
                    self.filename,
                    format_file_size(bytes)
                );
            }
            Ok(Err(e)) => {
                tracing::error!(
                    "download for {} failed after headers were sent, body truncated: {}",
                    self.url,
                    e
                );
            }
            Err(_) => tracing::info!("download complete: {}", self.filename),
        }
    }
}

impl Stream for AudioBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(chunk) = this.staged.take() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        if this.finished {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.rest).poll_next(cx)) {
            Some(chunk) => Poll::Ready(Some(chunk)),
            None => {
                this.finished = true;
                this.report();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for AudioBody {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                "stream for {} ended before the pipeline finished, cancelling",
                self.url
            );
            self.cancel.cancel();
        }
    }
}
