//! Background reader that turns the child's output into published result sets.
//!
//! The reader blocks only on the child. It never waits for the foreground:
//! notifications go through a bounded channel with `try_send`, and a full
//! channel just means a redraw is already pending.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::protocol;
use crate::store::SharedResults;

/// Default cap on a single message, terminator excluded.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Notifications sent from the reader to the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A new set was published to the store.
    ResultsReady { count: usize },
    /// The reader stopped and will publish nothing more.
    Closed { reason: String },
}

/// Why the reader loop ended.
#[derive(Debug, thiserror::Error)]
pub enum ReaderExit {
    #[error("child closed its output")]
    EndOfStream,
    #[error("failed reading child output: {0}")]
    Io(#[from] std::io::Error),
    #[error("foreground stopped listening")]
    ForegroundClosed,
}

enum Frame {
    Message,
    Oversized,
    Eof,
}

/// Reads newline-terminated messages, decodes them and publishes the result.
pub struct ReaderLoop<R> {
    reader: BufReader<R>,
    store: SharedResults,
    events: mpsc::Sender<PipelineEvent>,
    max_message_bytes: usize,
}

impl<R: AsyncRead + Unpin> ReaderLoop<R> {
    pub fn new(reader: R, store: SharedResults, events: mpsc::Sender<PipelineEvent>) -> Self {
        Self {
            reader: BufReader::new(reader),
            store,
            events,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max.max(1);
        self
    }

    /// Runs until the child closes its output, a read fails, or the
    /// foreground drops its receiver. Sends a final [`PipelineEvent::Closed`].
    pub async fn run(mut self) -> ReaderExit {
        let exit = self.pump().await;
        match &exit {
            ReaderExit::EndOfStream => tracing::info!("child output closed"),
            ReaderExit::Io(err) => tracing::warn!(%err, "reader stopped"),
            ReaderExit::ForegroundClosed => tracing::debug!("foreground gone, reader stopping"),
        }
        // Best effort: the foreground may already be gone.
        let _ = self
            .events
            .send(PipelineEvent::Closed {
                reason: exit.to_string(),
            })
            .await;
        exit
    }

    async fn pump(&mut self) -> ReaderExit {
        let mut message = Vec::new();
        loop {
            message.clear();
            match self.read_message(&mut message).await {
                Ok(Frame::Message) => {}
                Ok(Frame::Oversized) => {
                    tracing::warn!(
                        limit = self.max_message_bytes,
                        "discarding oversized message"
                    );
                    continue;
                }
                Ok(Frame::Eof) => return ReaderExit::EndOfStream,
                Err(err) => return ReaderExit::Io(err),
            }

            match protocol::decode(&message) {
                Ok(results) => {
                    let count = results.len();
                    self.store.replace(results);
                    tracing::debug!(count, "published results");
                    match self.events.try_send(PipelineEvent::ResultsReady { count }) {
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => return ReaderExit::ForegroundClosed,
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, bytes = message.len(), "discarding malformed message");
                }
            }
        }
    }

    /// Reads one message into `buf` without its terminator.
    ///
    /// A trailing partial message at end of stream is dropped.
    async fn read_message(&mut self, buf: &mut Vec<u8>) -> std::io::Result<Frame> {
        let limit = self.max_message_bytes as u64 + 1;
        let read = (&mut self.reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 {
            return Ok(Frame::Eof);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            return Ok(Frame::Message);
        }
        if buf.len() as u64 >= limit {
            self.skip_line().await?;
            return Ok(Frame::Oversized);
        }
        if !buf.is_empty() {
            tracing::debug!(bytes = buf.len(), "dropping unterminated trailing message");
        }
        Ok(Frame::Eof)
    }

    /// Discards input up to and including the next newline.
    async fn skip_line(&mut self) -> std::io::Result<()> {
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(());
            }
            if let Some(newline) = chunk.iter().position(|&b| b == b'\n') {
                self.reader.consume(newline + 1);
                return Ok(());
            }
            let len = chunk.len();
            self.reader.consume(len);
        }
    }
}

/// Spawns a [`ReaderLoop`] on the current runtime.
pub fn spawn_reader<R>(
    reader: R,
    store: SharedResults,
    events: mpsc::Sender<PipelineEvent>,
    max_message_bytes: usize,
) -> JoinHandle<ReaderExit>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        ReaderLoop::new(reader, store, events)
            .with_max_message_bytes(max_message_bytes)
            .run(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::ResultStore;
    use tokio::io::AsyncWriteExt;

    fn texts(store: &ResultStore) -> Vec<String> {
        store
            .snapshot()
            .results
            .iter()
            .map(|r| r.text.to_string())
            .collect()
    }

    #[tokio::test]
    async fn publishes_each_message_and_stops_at_eof() {
        let store = ResultStore::shared(10);
        let (tx, mut rx) = mpsc::channel(8);
        let (mut child_out, reader) = tokio::io::duplex(64);

        let task = spawn_reader(reader, Arc::clone(&store), tx, DEFAULT_MAX_MESSAGE_BYTES);

        child_out.write_all(b"{one|1}{two|2}\n").await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::ResultsReady { count: 2 })
        );
        assert_eq!(texts(&store), ["one", "two"]);

        child_out.write_all(b"{three|3}\n").await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::ResultsReady { count: 1 })
        );
        assert_eq!(texts(&store), ["three"]);

        drop(child_out);
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Closed { .. })));
        assert!(matches!(task.await.unwrap(), ReaderExit::EndOfStream));
    }

    #[tokio::test]
    async fn malformed_message_keeps_previous_set() {
        let store = ResultStore::shared(10);
        let (tx, mut rx) = mpsc::channel(8);
        let input: &[u8] = b"{keep|k}\n{broken|x\n}stray\n{next|n}\n";

        let exit = ReaderLoop::new(input, Arc::clone(&store), tx).run().await;
        assert!(matches!(exit, ReaderExit::EndOfStream));

        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::ResultsReady { count: 1 })
        );
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::ResultsReady { count: 1 })
        );
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Closed { .. })));
        assert_eq!(texts(&store), ["next"]);
    }

    #[tokio::test]
    async fn message_split_across_writes_is_reassembled() {
        let store = ResultStore::shared(10);
        let (tx, mut rx) = mpsc::channel(8);
        let (mut child_out, reader) = tokio::io::duplex(8);
        let task = spawn_reader(reader, Arc::clone(&store), tx, DEFAULT_MAX_MESSAGE_BYTES);

        for chunk in [&b"{a long"[..], b" title|ac", b"tion}", b"\n"] {
            child_out.write_all(chunk).await.unwrap();
            child_out.flush().await.unwrap();
        }
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::ResultsReady { count: 1 })
        );
        assert_eq!(store.current_action().as_deref(), Some("action"));

        drop(child_out);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_message_is_skipped() {
        let store = ResultStore::shared(10);
        let (tx, mut rx) = mpsc::channel(8);
        let mut input = Vec::new();
        input.extend_from_slice(b"{");
        input.extend(std::iter::repeat_n(b'x', 100));
        input.extend_from_slice(b"}\n{small|s}\n");

        ReaderLoop::new(input.as_slice(), Arc::clone(&store), tx)
            .with_max_message_bytes(16)
            .run()
            .await;

        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::ResultsReady { count: 1 })
        );
        assert_eq!(texts(&store), ["small"]);
    }

    #[tokio::test]
    async fn message_at_exact_limit_is_accepted() {
        let store = ResultStore::shared(10);
        let (tx, _rx) = mpsc::channel(8);
        let input: &[u8] = b"{abcdef|g}\n";

        ReaderLoop::new(input, Arc::clone(&store), tx)
            .with_max_message_bytes(10)
            .run()
            .await;
        assert_eq!(texts(&store), ["abcdef"]);
    }

    #[tokio::test]
    async fn trailing_partial_message_is_dropped() {
        let store = ResultStore::shared(10);
        let (tx, _rx) = mpsc::channel(8);
        let input: &[u8] = b"{done|d}\n{half|h}";

        ReaderLoop::new(input, Arc::clone(&store), tx).run().await;
        assert_eq!(texts(&store), ["done"]);
    }

    #[tokio::test]
    async fn full_channel_does_not_block_reader() {
        let store = ResultStore::shared(10);
        let (tx, mut rx) = mpsc::channel(1);
        let input: &[u8] = b"{a|1}\n{b|2}\n{c|3}\n";

        let task = tokio::spawn(ReaderLoop::new(input, Arc::clone(&store), tx).run());
        loop {
            match rx.recv().await {
                Some(PipelineEvent::ResultsReady { count }) => assert_eq!(count, 1),
                Some(PipelineEvent::Closed { .. }) => break,
                None => panic!("reader dropped its sender without closing"),
            }
        }
        assert!(matches!(task.await.unwrap(), ReaderExit::EndOfStream));
        assert_eq!(texts(&store), ["c"]);
    }

    #[tokio::test]
    async fn stops_when_foreground_is_gone() {
        let store = ResultStore::shared(10);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let input: &[u8] = b"{a|1}\n{b|2}\n";

        let exit = ReaderLoop::new(input, Arc::clone(&store), tx).run().await;
        assert!(matches!(exit, ReaderExit::ForegroundClosed));
        assert_eq!(texts(&store), ["a"]);
    }

    #[tokio::test]
    async fn crlf_terminated_messages_decode() {
        let store = ResultStore::shared(10);
        let (tx, _rx) = mpsc::channel(8);
        let input: &[u8] = b"{win|w}\r\n";

        ReaderLoop::new(input, Arc::clone(&store), tx).run().await;
        assert_eq!(texts(&store), ["win"]);
    }
}
