//! Streaming vs. buffering decision for one model answer.
//!
//! [`detect`] reads a bounded prefix of the answer stream exactly once and
//! looks for the start of a tool call. Plain answers are handed back as a
//! [`Route::Passthrough`] that re-emits the consumed prefix followed by the
//! still-live stream, so the caller can forward text as it arrives. Answers
//! that look like tool calls are read to completion and returned as
//! [`Route::Buffered`] bytes for the parser.
//!
//! Tool syntax that first appears after the prefix is not detected; that
//! answer is passed through as text.

use regex::bytes::Regex;
use std::io::{self, Cursor};
use std::sync::LazyLock;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

static TOOL_CALL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{"tool_calls":|<tool name="|TOOL:\w+:\w"#).expect("hardcoded regex is valid")
});

/// The detector's decision for one answer.
pub enum Route<R> {
    /// No tool call in the prefix. `prefix` holds the bytes already consumed
    /// from `rest`.
    Passthrough { prefix: Vec<u8>, rest: R },
    /// The whole answer, read to the end. Kept as raw bytes so an answer that
    /// turns out to hold no calls can be written out unchanged.
    Buffered(Vec<u8>),
}

impl<R> std::fmt::Debug for Route<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Passthrough { prefix, .. } => f
                .debug_struct("Passthrough")
                .field("prefix_len", &prefix.len())
                .finish_non_exhaustive(),
            Route::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
        }
    }
}

impl<R: AsyncRead + Unpin> Route<R> {
    /// `"passthrough"` or `"buffered"`, for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Route::Passthrough { .. } => "passthrough",
            Route::Buffered(_) => "buffered",
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, Route::Buffered(_))
    }

    /// The full answer as one reader: prefix first, then the rest of the stream.
    pub fn into_reader(self) -> Box<dyn AsyncRead + Unpin + Send>
    where
        R: Send + 'static,
    {
        match self {
            Route::Passthrough { prefix, rest } => Box::new(Cursor::new(prefix).chain(rest)),
            Route::Buffered(bytes) => Box::new(Cursor::new(bytes)),
        }
    }

    /// Write the whole answer to `writer`, streaming the passthrough case as
    /// it arrives. Returns the number of bytes written.
    pub async fn forward<W>(self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let written = match self {
            Route::Passthrough { prefix, mut rest } => {
                writer.write_all(&prefix).await?;
                let copied = tokio::io::copy(&mut rest, &mut *writer).await?;
                prefix.len() as u64 + copied
            }
            Route::Buffered(bytes) => {
                writer.write_all(&bytes).await?;
                bytes.len() as u64
            }
        };
        writer.flush().await?;
        Ok(written)
    }
}

/// Whether `prefix` contains the start of any recognized call syntax.
pub fn looks_like_tool_call(prefix: &[u8]) -> bool {
    TOOL_CALL_START.is_match(prefix)
}

/// Read up to `detection_buffer_bytes` from `reader` and route the answer.
///
/// The prefix read fills until the limit or end of stream. Only a buffered
/// route reads further.
pub async fn detect<R>(mut reader: R, detection_buffer_bytes: usize) -> io::Result<Route<R>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = Vec::with_capacity(detection_buffer_bytes);
    (&mut reader)
        .take(detection_buffer_bytes as u64)
        .read_to_end(&mut prefix)
        .await?;

    trace!(
        "Detector prefix ({} bytes): {}",
        prefix.len(),
        String::from_utf8_lossy(&prefix)
    );

    if !looks_like_tool_call(&prefix) {
        debug!("No tool syntax in first {} bytes, passing through", prefix.len());
        return Ok(Route::Passthrough {
            prefix,
            rest: reader,
        });
    }

    reader.read_to_end(&mut prefix).await?;
    debug!("Tool syntax detected, buffered {} bytes", prefix.len());
    Ok(Route::Buffered(prefix))
}
