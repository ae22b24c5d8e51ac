//! Byte plumbing between the two children and the caller's sink

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Copy the extractor's stdout into the transcoder's stdin.
///
/// The writer is handed back still open: the caller closes it only after the
/// extractor has been reaped. The reader is dropped here, so a dead transcoder
/// makes the extractor fail on its next write instead of blocking.
pub async fn pump<R, W>(mut from: R, mut into: W) -> (std::io::Result<u64>, W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(&mut from, &mut into).await;
    (copied, into)
}

/// Close the conduit so the transcoder sees end-of-input
pub async fn close<W>(mut into: W)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = into.shutdown().await {
        tracing::debug!("closing transcoder stdin: {}", e);
    }
}

/// Copy the transcoder's stdout into the sink, flushing at the end.
///
/// Takes the reader by value so a failed sink closes the pipe and the
/// transcoder exits rather than blocking on a full pipe.
pub async fn deliver<R, W>(mut from: R, sink: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    let copied = tokio::io::copy(&mut from, sink).await?;
    sink.flush().await?;
    Ok(copied)
}

/// Read a child stream to the end, keeping at most `limit` bytes as trimmed text
pub async fn capture_text<R>(mut from: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        match from.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                tracing::debug!("reading child output: {}", e);
                break;
            }
        }
    }

    String::from_utf8_lossy(&kept).trim().to_string()
}
