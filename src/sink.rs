use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for formatted log lines produced by the
/// logging layer.
///
/// Each line is one complete JSON object terminated by `\n`, ready for
/// line-delimited ingestion (stdout on App Engine and Cloud Run, a file,
/// a log agent socket, etc). The layer calls `send` from a background
/// task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single formatted line to the underlying destination.
    ///
    /// **Parameters**
    /// - `line`: UTF-8 JSON followed by a single newline.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted.
    /// - `Err(..)` if the destination failed. The layer treats this as a
    ///   transient failure and retries the remainder of the batch with
    ///   backoff.
    async fn send(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered lines, if the destination buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
