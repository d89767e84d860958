//! Server-Sent Events framing of relayed chunks

use crate::proxy::ChunkStream;
use crate::wire::StreamChunk;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Convert a chunk stream to an SSE response body
pub fn sse_stream(chunks: ChunkStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = chunks.map(|chunk| Ok(chunk_to_event(&chunk)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn chunk_to_event(chunk: &StreamChunk) -> Event {
    let data = match serde_json::to_string(chunk) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream chunk");
            r#"{"type":"error","kind":"generation_failed","message":"unserializable chunk"}"#
                .to_string()
        }
    };

    Event::default().event(chunk.event_name()).data(data)
}

