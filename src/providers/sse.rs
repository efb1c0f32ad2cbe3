//! Server-sent events parsing for streamed provider responses
//!
//! The HTTP body arrives as arbitrary byte chunks. Events are reassembled
//! across chunk boundaries and only complete `data:` payloads are forwarded,
//! in arrival order, through an unbounded channel.

use crate::error::{AcervoError, Result};
use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Spawn a parser task over `byte_stream` and return its `data:` payloads
///
/// The returned stream ends when the body ends. A transport failure is
/// delivered as a single `Err` item followed by the end of the stream.
pub fn data_stream<S>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(parse_sse_stream(byte_stream, tx));
    UnboundedReceiverStream::new(rx)
}

/// Parse an SSE byte stream and forward complete `data:` events to `event_tx`
///
/// Runs until the body ends, a chunk fails, or the receiver is dropped. A
/// dropped receiver is noticed while waiting on the body, so a stalled body
/// is released as soon as the consumer goes away. `\r\n` line endings are normalized, and UTF-8 sequences split across
/// chunks are held back until complete.
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    event_tx: mpsc::UnboundedSender<Result<String>>,
) {
    use futures::StreamExt;

    let mut buffer = String::new();
    let mut pending: Vec<u8> = Vec::new();

    tokio::pin!(byte_stream);

    loop {
        let chunk_result = tokio::select! {
            _ = event_tx.closed() => {
                tracing::debug!("SSE receiver dropped, releasing body");
                return;
            }
            next = byte_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
        };

        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("SSE body failed mid-stream: {}", e);
                let _ = event_tx.send(Err(AcervoError::Transport(format!(
                    "Stream interrupted: {}",
                    e
                ))
                .into()));
                return;
            }
        };

        pending.extend_from_slice(&chunk);
        buffer.push_str(&take_utf8_prefix(&mut pending));
        if buffer.contains('\r') {
            buffer = buffer.replace("\r\n", "\n");
        }

        while let Some(pos) = buffer.find("\n\n") {
            let event_block: String = buffer.drain(..pos + 2).collect();
            if let Some(data) = process_sse_event(&event_block) {
                if event_tx.send(Ok(data)).is_err() {
                    tracing::debug!("SSE receiver dropped, stopping parser");
                    return;
                }
            }
        }
    }

    if !pending.is_empty() {
        buffer.push_str(&String::from_utf8_lossy(&pending));
    }
    if !buffer.trim().is_empty() {
        if let Some(data) = process_sse_event(&buffer) {
            let _ = event_tx.send(Ok(data));
        }
    }
}

/// Drain the longest valid UTF-8 prefix of `pending`
///
/// An incomplete trailing sequence stays in `pending`; invalid bytes are
/// replaced.
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(s) => {
            let out = s.to_string();
            pending.clear();
            out
        }
        Err(e) => {
            let valid = e.valid_up_to();
            let consumed = match e.error_len() {
                Some(len) => valid + len,
                None => valid,
            };
            let out = String::from_utf8_lossy(&pending[..consumed]).into_owned();
            pending.drain(..consumed);
            out
        }
    }
}

/// Extract the joined `data:` value of one event block
///
/// `id:`, `event:` and `retry:` fields and `:` comments are ignored.
/// Returns `None` for blocks without data.
fn process_sse_event(event_block: &str) -> Option<String> {
    let data_lines: Vec<&str> = event_block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() {
        None
    } else {
        Some(data)
    }
}
