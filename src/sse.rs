//! Server-Sent Events framing for the chat reply stream.
//!
//! Only the reduced grammar the chat service speaks is understood: blocks
//! separated by a blank line, each holding zero or more `data: ` lines.
//!
//! SSE format:
//! ```text
//! data: Hel
//! data: lo
//!
//! data: [DONE]
//!
//! ```
//!
//! Every `data: ` line is its own chunk, so the block above yields `"Hel"`,
//! `"lo"` and `"[DONE]"`. Event names, ids, retry hints and comments are
//! ignored.

use futures::stream::Stream;
use tracing::debug;

use crate::client::ClientError;
use crate::options::StreamOptions;
use crate::stream::chunk_stream;
use crate::utf8::Utf8Decoder;

/// Prefix of a data line. The payload is everything after it.
pub const DATA_PREFIX: &str = "data: ";

/// Separator between blocks.
pub const BLOCK_DELIMITER: &str = "\n\n";

/// Payload the service sends once the reply is complete.
pub const DONE_MARKER: &str = "[DONE]";

/// Extension trait for `reqwest::Response` to enable SSE streaming.
///
/// # Example
/// ```ignore
/// use futures::StreamExt;
/// use ssechat::sse::SSEResponseExt;
///
/// let response = client.post(url).json(&body).send().await?;
/// let mut chunks = Box::pin(response.sse());
/// while let Some(chunk) = chunks.next().await {
///     println!("chunk: {}", chunk?);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response body into a stream of data-line payloads.
    ///
    /// `[DONE]` is yielded like any other payload.
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send;

    /// Same as [`sse`](SSEResponseExt::sse) with a read timeout and/or a
    /// cancellation token.
    fn sse_with(self, options: StreamOptions)
        -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        self.sse_with(StreamOptions::default())
    }

    fn sse_with(
        self,
        options: StreamOptions,
    ) -> impl Stream<Item = Result<String, ClientError>> + Send {
        chunk_stream(self.bytes_stream(), options)
    }
}

/// Accumulates decoded text and cuts it into complete blocks.
///
/// Only the unterminated tail is kept between calls. The delimiter is
/// matched leftmost-first without overlap, so `"a\n\n\nb\n\n"` yields the
/// blocks `"a"` and `"\nb"` no matter how the text was fragmented.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: String,
    // Bytes of `buffer` already known to contain no delimiter.
    scanned: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every block completed by it, in order.
    ///
    /// The text after the last delimiter (possibly empty) is retained as the
    /// new remainder and is not returned.
    pub fn ingest(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        // A delimiter may straddle the old end of the buffer.
        let mut start = self.scanned.saturating_sub(BLOCK_DELIMITER.len() - 1);
        while !self.buffer.is_char_boundary(start) {
            start -= 1;
        }

        let mut blocks = Vec::new();
        let mut block_start = 0;
        for (offset, _) in self.buffer[start..].match_indices(BLOCK_DELIMITER) {
            let end = start + offset;
            blocks.push(self.buffer[block_start..end].to_owned());
            block_start = end + BLOCK_DELIMITER.len();
        }

        self.buffer.drain(..block_start);
        self.scanned = self.buffer.len();
        blocks
    }

    /// End-of-stream flush: the same split rule with no new input.
    ///
    /// A remainder that never got its terminating blank line stays in the
    /// buffer and is not returned.
    pub fn flush(&mut self) -> Vec<String> {
        self.ingest("")
    }

    /// The unterminated tail held between calls.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }
}

/// Extract the chunks carried by one block, in line order.
///
/// # Example
/// ```
/// use ssechat::sse::parse_block;
///
/// let chunks: Vec<&str> = parse_block("event: delta\ndata: a\ndata: b").collect();
/// assert_eq!(chunks, ["a", "b"]);
/// ```
pub fn parse_block(block: &str) -> impl Iterator<Item = &str> {
    block.split('\n').filter_map(parse_sse_line)
}

/// Parse an SSE line to extract the data portion.
///
/// The payload is returned verbatim, surrounding whitespace included.
///
/// # Example
/// ```
/// use ssechat::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_line("data:no-space"), None);
/// assert_eq!(parse_sse_line("invalid"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
}

/// Check if a chunk is the service's end-of-reply marker.
///
/// The decoder never acts on it; this is for the layer displaying chunks.
///
/// # Example
/// ```
/// use ssechat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker(" [DONE]"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == DONE_MARKER
}

/// Per-session decoding state: bytes in, chunks out.
///
/// One value per response body. It owns the session buffer, so independent
/// sessions never share state.
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8Decoder,
    frames: FrameBuffer,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one body fragment and return the chunks it completed.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(fragment);
        collect_chunks(self.frames.ingest(&text))
    }

    /// Run the single end-of-stream flush pass.
    pub fn finish(&mut self) -> Vec<String> {
        // The held-back bytes can only extend the unterminated tail.
        let blocks = self.frames.ingest(&self.utf8.finish());

        let dropped = self.frames.remainder();
        if !dropped.is_empty() {
            debug!(bytes = dropped.len(), "dropping undelimited trailing block");
        }
        collect_chunks(blocks)
    }

    /// Text received but not yet part of a complete block.
    pub fn buffered(&self) -> &str {
        self.frames.remainder()
    }
}

fn collect_chunks(blocks: Vec<String>) -> Vec<String> {
    blocks
        .iter()
        .flat_map(|block| parse_block(block))
        .map(str::to_owned)
        .collect()
}
