//! # ssechat - streaming chat client
//!
//! Sends a prompt to a chat service and yields the reply as it is produced.
//!
//! The service answers with a Server-Sent Events body. Bytes arrive in
//! arbitrary fragments, so the interesting part is the incremental decoder:
//!
//! 1. [`utf8::Utf8Decoder`] turns fragments into text, holding back
//!    multi-byte characters that were split by a read.
//! 2. [`sse::FrameBuffer`] cuts the text into blank-line-terminated blocks,
//!    keeping only the unterminated tail.
//! 3. [`sse::parse_block`] pulls the `data: ` payloads out of each block.
//! 4. [`stream::chunk_stream`] drives the above over a byte stream and
//!    flushes once at the end.
//!
//! A block that never receives its terminating blank line is dropped, and
//! each `data: ` line is a separate chunk. The `[DONE]` payload is passed
//! through untouched; filter it with [`sse::is_done_marker`].
//!
//! ## Example
//! ```no_run
//! use ssechat::client::ChatClient;
//! use ssechat::options::TransportOptions;
//! use ssechat::sse::is_done_marker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(TransportOptions::from_env()?)?;
//!
//!     let mut reply = String::new();
//!     let mut on_chunk = |chunk: &str| {
//!         if !is_done_marker(chunk) {
//!             reply.push_str(chunk);
//!         }
//!     };
//!     client.send_chat("What's the weather in Oslo?", &mut on_chunk).await?;
//!
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;
pub mod stream;
pub mod utf8;

// Re-exports for convenience
pub use client::{ChatClient, ClientError};
pub use model::ChatRequest;
pub use options::{StreamOptions, TransportOptions};
pub use sse::{is_done_marker, SseDecoder};
pub use stream::{chunk_stream, drive, ChunkSink};
