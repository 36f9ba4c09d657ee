//! Stream driver: pulls body fragments and turns them into chunks.
//!
//! The driver reads one fragment at a time, decodes it, and hands out every
//! chunk that fragment completed before reading the next one. When the
//! source is exhausted it runs exactly one flush pass. A transport error,
//! a read timeout or a cancellation ends the stream with a single error and
//! no flush.
//!
//! ```text
//! Reading --fragment--> decode/parse --> Reading
//! Reading --end of body--> flush --> Done
//! Reading --error/timeout--> Failed
//! Reading --cancelled--> Cancelled
//! ```

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use tracing::debug;

use crate::client::ClientError;
use crate::options::StreamOptions;
use crate::sse::SseDecoder;

/// Receives chunks as the driver produces them.
///
/// Called synchronously from the driver, once per chunk, in order.
pub trait ChunkSink {
    fn on_chunk(&mut self, chunk: &str);
}

impl<F: FnMut(&str)> ChunkSink for F {
    fn on_chunk(&mut self, chunk: &str) {
        self(chunk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Done,
    Failed,
    Cancelled,
}

struct Driver<S> {
    // Dropped as soon as the driver stops reading, which closes the body.
    source: Option<Pin<Box<S>>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    phase: Phase,
    options: StreamOptions,
}

impl<S, B, E> Driver<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    fn new(source: S, options: StreamOptions) -> Self {
        Self {
            source: Some(Box::pin(source)),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            phase: Phase::Reading,
            options,
        }
    }

    async fn next(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(Ok(chunk));
            }
            if self.phase != Phase::Reading {
                return None;
            }

            match self.next_fragment().await {
                Ok(Some(fragment)) => {
                    let fragment = fragment.as_ref();
                    let chunks = self.decoder.feed(fragment);
                    debug!(bytes = fragment.len(), chunks = chunks.len(), "decoded fragment");
                    self.ready.extend(chunks);
                }
                Ok(None) => {
                    let chunks = self.decoder.finish();
                    debug!(chunks = chunks.len(), "body exhausted, flushed");
                    self.ready.extend(chunks);
                    self.stop(Phase::Done);
                }
                Err(err) => {
                    let phase = match err {
                        ClientError::StreamCancelled => Phase::Cancelled,
                        _ => Phase::Failed,
                    };
                    debug!(error = %err, buffered = self.decoder.buffered().len(), "stream aborted");
                    self.stop(phase);
                    return Some(Err(err));
                }
            }
        }
    }

    async fn next_fragment(&mut self) -> Result<Option<B>, ClientError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        let read_timeout = self.options.read_timeout;
        let cancel = self.options.cancel.clone();

        let read = async {
            let next = source.next();
            match read_timeout {
                Some(limit) => tokio::time::timeout(limit, next)
                    .await
                    .map_err(|_| ClientError::ReadTimeout(limit)),
                None => Ok(next.await),
            }
        };

        let item = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ClientError::StreamCancelled),
                item = read => item?,
            },
            None => read.await?,
        };

        item.transpose().map_err(Into::into)
    }

    fn stop(&mut self, phase: Phase) {
        self.phase = phase;
        self.source = None;
    }
}

/// Turn a byte stream into a lazy stream of chunks.
///
/// Chunks come out in emission order. The stream is finite and cannot be
/// restarted; after an error item it yields nothing more.
///
/// # Example
/// ```
/// use bytes::Bytes;
/// use futures::{stream, TryStreamExt};
/// use ssechat::options::StreamOptions;
/// use ssechat::stream::chunk_stream;
///
/// # futures::executor::block_on(async {
/// let body = stream::iter([
///     Ok::<_, std::io::Error>(Bytes::from_static(b"data: Hel")),
///     Ok(Bytes::from_static(b"lo\n\ndata: [DONE]\n\n")),
/// ]);
/// let chunks: Vec<String> = chunk_stream(body, StreamOptions::default())
///     .try_collect()
///     .await
///     .unwrap();
/// assert_eq!(chunks, ["Hello", "[DONE]"]);
/// # });
/// ```
pub fn chunk_stream<S, B, E>(
    source: S,
    options: StreamOptions,
) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Into<ClientError> + Send,
{
    stream::unfold(Driver::new(source, options), |mut driver| async move {
        let item = driver.next().await?;
        Some((item, driver))
    })
}

/// Drive a byte stream to completion, handing each chunk to `sink`.
///
/// Returns once the final flush has run, or with the first error.
pub async fn drive<S, B, E, K>(
    source: S,
    options: StreamOptions,
    sink: &mut K,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
    K: ChunkSink + ?Sized,
{
    let mut driver = Driver::new(source, options);
    while let Some(chunk) = driver.next().await {
        sink.on_chunk(&chunk?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use std::io;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fragments(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        let items: Vec<_> = parts
            .iter()
            .map(|part| Ok(Bytes::from_static(part.as_bytes())))
            .collect();
        stream::iter(items)
    }

    async fn collect(parts: &[&'static str]) -> Vec<String> {
        chunk_stream(fragments(parts), StreamOptions::default())
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_data_line() {
        assert_eq!(collect(&["data: hello\n\n"]).await, ["hello"]);
    }

    #[tokio::test]
    async fn test_multiple_data_lines_one_block() {
        assert_eq!(collect(&["data: a\ndata: b\n\n"]).await, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_trailing_partial_block_dropped() {
        assert!(collect(&["data: partial"]).await.is_empty());
        assert_eq!(collect(&["data: a\n\ndata: b\n"]).await, ["a"]);
    }

    #[tokio::test]
    async fn test_two_fragment_scenario() {
        let mut seen = Vec::new();
        let mut sink = |chunk: &str| seen.push(chunk.to_string());
        drive(
            fragments(&["data: Hel", "lo\n\ndata: [DONE]\n\n"]),
            StreamOptions::default(),
            &mut sink,
        )
        .await
        .unwrap();
        assert_eq!(seen, ["Hello", "[DONE]"]);
    }

    #[tokio::test]
    async fn test_empty_body() {
        assert!(collect(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_aborts_without_flush() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n\ndata: b")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"\n\n")),
        ]);
        let items: Vec<_> = chunk_stream(source, StreamOptions::default()).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(items[1], Err(ClientError::Io(_))));
    }

    #[tokio::test]
    async fn test_drive_surfaces_error() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")),
        ]);
        let mut count = 0;
        let mut sink = |_: &str| count += 1;
        let result = drive(source, StreamOptions::default(), &mut sink).await;

        assert!(matches!(result, Err(ClientError::Io(_))));
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_read() {
        let token = CancellationToken::new();
        token.cancel();
        let options = StreamOptions::new().with_cancel(token);

        let items: Vec<_> = chunk_stream(fragments(&["data: a\n\n"]), options).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ClientError::StreamCancelled)));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let token = CancellationToken::new();
        let options = StreamOptions::new().with_cancel(token.clone());
        let source = fragments(&["data: a\n\ndata: unfinished"])
            .chain(stream::pending::<Result<Bytes, io::Error>>());
        let chunks = chunk_stream(source, options);
        futures::pin_mut!(chunks);

        assert_eq!(chunks.next().await.unwrap().unwrap(), "a");
        token.cancel();
        assert!(matches!(chunks.next().await, Some(Err(ClientError::StreamCancelled))));
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let options = StreamOptions::new().with_read_timeout(Duration::from_millis(20));
        let source = stream::pending::<Result<Bytes, io::Error>>();
        let items: Vec<_> = chunk_stream(source, options).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ClientError::ReadTimeout(d)) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let first = chunk_stream(fragments(&["data: one"]), StreamOptions::default());
        let second = chunk_stream(fragments(&["data: two\n\n"]), StreamOptions::default());

        let first: Vec<String> = first.try_collect().await.unwrap();
        let second: Vec<String> = second.try_collect().await.unwrap();
        assert!(first.is_empty());
        assert_eq!(second, ["two"]);
    }
}
