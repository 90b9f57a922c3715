//! Turns a run's line queue into a Server-Sent Events body.
//!
//! The queue wait is the only suspension point. A wait that times out yields
//! an empty `data: ` keep-alive event so intermediaries do not close an idle
//! connection; the end-of-stream marker yields `event: done` and ends the
//! stream.
//!
//! Frames are encoded here rather than through `axum::response::sse::Event`,
//! which drops the `data` field entirely when the payload is empty.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use scriptrun_core::runs::{Received, RunRecord};

/// Data carried by the terminal event.
pub const DONE_DATA: &str = "finished";

/// Streaming `text/event-stream` response for one attached consumer.
pub fn output_response(record: Arc<RunRecord>, keepalive: Duration) -> Response {
    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(output_frames(record, keepalive)),
    )
        .into_response()
}

/// Encoded SSE frames for one attached consumer of `record`.
pub fn output_frames(
    record: Arc<RunRecord>,
    keepalive: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    futures::stream::unfold(Some(record), move |state| async move {
        let record = state?;
        let frame = match record.queue().recv_timeout(keepalive).await {
            Received::Line(line) => line_frame(&line),
            Received::Timeout => keepalive_frame(),
            Received::End => {
                tracing::debug!(run_id = %record.run_id(), "Stream finished");
                return Some((Ok(done_frame()), None));
            }
        };
        Some((Ok(frame), Some(record)))
    })
}

/// One output line, JSON-encoded so embedded newlines stay inside one
/// `data:` field.
pub fn line_frame(line: &str) -> Bytes {
    let encoded = serde_json::to_string(line).unwrap_or_else(|_| String::from("\"\""));
    Bytes::from(format!("data: {encoded}\n\n"))
}

pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(b"data: \n\n")
}

pub fn done_frame() -> Bytes {
    Bytes::from(format!("event: done\ndata: {DONE_DATA}\n\n"))
}
