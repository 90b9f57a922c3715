//! Per-run output channel.
//!
//! A [`line_queue`] pairs a [`LineSender`] (held by the launcher task) with a
//! [`LineQueue`] (held by the run record and read by stream publishers).
//! The channel is unbounded so a slow or absent observer never stalls the
//! child process. The end-of-stream marker can only be produced by
//! [`LineSender::finish`], which consumes the sender, so it is always the
//! last item and appears at most once.

use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

/// One item travelling through the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QueueItem {
    Line(String),
    End,
}

/// Outcome of a bounded wait on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A chunk of output (normally one line including its trailing newline).
    Line(String),
    /// End of stream: no further output will ever be produced.
    End,
    /// Nothing arrived within the wait period.
    Timeout,
}

/// Producer half. Not `Clone`: exactly one launcher writes to a run.
#[derive(Debug)]
pub struct LineSender {
    tx: mpsc::UnboundedSender<QueueItem>,
}

impl LineSender {
    /// Enqueue a chunk of output.
    ///
    /// If the consumer half is gone (the record was evicted) the line is
    /// dropped silently.
    pub fn push(&self, line: impl Into<String>) {
        let _ = self.tx.send(QueueItem::Line(line.into()));
    }

    /// Enqueue the end-of-stream marker and close the channel.
    pub fn finish(self) {
        let _ = self.tx.send(QueueItem::End);
    }
}

/// Consumer half, owned by the run record.
#[derive(Debug)]
pub struct LineQueue {
    rx: Mutex<mpsc::UnboundedReceiver<QueueItem>>,
}

impl LineQueue {
    /// Wait up to `timeout` for the next item.
    ///
    /// Once the marker has been taken by any consumer the channel is closed,
    /// so every later call returns [`Received::End`] immediately. A launcher
    /// that vanished without calling [`LineSender::finish`] also reads as
    /// end of stream.
    pub async fn recv_timeout(&self, timeout: Duration) -> Received {
        let next = tokio::time::timeout(timeout, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await;

        match next {
            Ok(Some(QueueItem::Line(line))) => Received::Line(line),
            Ok(Some(QueueItem::End)) | Ok(None) => Received::End,
            Err(_elapsed) => Received::Timeout,
        }
    }
}

/// Create a connected sender/queue pair.
pub fn line_queue() -> (LineSender, LineQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LineSender { tx }, LineQueue { rx: Mutex::new(rx) })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
