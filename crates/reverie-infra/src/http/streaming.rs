//! SSE byte stream to [`StreamEvent`] adapter.
//!
//! The send endpoint responds with `text/event-stream`; each `data:`
//! payload is a JSON stream event tagged by `type`. This adapter parses
//! the SSE framing with `eventsource-stream` and maps each payload to the
//! closed [`StreamEvent`] union.
//!
//! Protocol tolerances:
//! - comment/keepalive lines are handled by the SSE parser and never
//!   reach us
//! - empty `data:` payloads and a `[DONE]` sentinel are skipped
//! - a stream that closes without a terminal event simply ends; the
//!   controller finalizes from its accumulated chunks

use futures_util::{Stream, StreamExt};

use eventsource_stream::Eventsource;

use reverie_core::chat::backend::EventStream;
use reverie_types::error::ChatError;
use reverie_types::stream::StreamEvent;

/// Map a raw SSE byte stream to a stream of [`StreamEvent`]s.
///
/// Generic over the byte source so tests can feed literal fixtures; the
/// client feeds `reqwest::Response::bytes_stream`.
pub fn sse_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut events = std::pin::pin!(bytes.eventsource());
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ChatError::Transport(e.to_string()))?;
            if event.data.is_empty() || event.data == "[DONE]" {
                continue;
            }
            let parsed: StreamEvent = serde_json::from_str(&event.data)
                .map_err(|e| ChatError::Deserialization(e.to_string()))?;
            yield parsed;
        }
    })
}
