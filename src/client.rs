//! Chat client and error types.

use std::time::Duration;

use futures::Stream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::http::{add_extra_headers, build_http_client, ensure_streamable};
use crate::model::ChatRequest;
use crate::options::{StreamOptions, TransportOptions};
use crate::sse::SSEResponseExt;
use crate::stream::{drive, ChunkSink};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("HTTP {0}: response has no body")]
    MissingBody(StatusCode),

    #[error("No data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Client for the streaming chat endpoint.
///
/// Each call opens one request/response exchange with its own decoding
/// session. Nothing is retried.
///
/// # Example
/// ```no_run
/// use futures::StreamExt;
/// use ssechat::client::ChatClient;
/// use ssechat::options::TransportOptions;
/// use ssechat::sse::is_done_marker;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ChatClient::new(TransportOptions::new())?;
///
///     let stream = client.chat_stream("Hello!").await?;
///     futures::pin_mut!(stream);
///     while let Some(chunk) = stream.next().await {
///         let chunk = chunk?;
///         if !is_done_marker(&chunk) {
///             print!("{}", chunk);
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    transport_options: TransportOptions,
}

impl ChatClient {
    /// Create a client from transport options.
    pub fn new(transport_options: TransportOptions) -> Result<Self, ClientError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            http,
            transport_options,
        })
    }

    /// Get reference to the transport options.
    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> String {
        self.transport_options.endpoint()
    }

    /// Send `message` and stream the reply as chunks.
    ///
    /// Fails before any decoding if the service answers with a non-success
    /// status or without a body. `[DONE]` is yielded like any other chunk.
    pub async fn chat_stream(
        &self,
        message: &str,
    ) -> Result<impl Stream<Item = Result<String, ClientError>> + Send, ClientError> {
        let response = self.open(message).await?;
        Ok(response.sse_with(self.stream_options(None)))
    }

    /// Like [`chat_stream`](ChatClient::chat_stream), but reading stops as
    /// soon as `token` is cancelled.
    pub async fn chat_stream_with_cancel(
        &self,
        message: &str,
        token: CancellationToken,
    ) -> Result<impl Stream<Item = Result<String, ClientError>> + Send, ClientError> {
        let response = self.open(message).await?;
        Ok(response.sse_with(self.stream_options(Some(token))))
    }

    /// Send `message` and hand every chunk of the reply to `sink`.
    ///
    /// Resolves after the end-of-stream flush, or with the first error.
    pub async fn send_chat<K>(&self, message: &str, sink: &mut K) -> Result<(), ClientError>
    where
        K: ChunkSink + ?Sized,
    {
        let response = self.open(message).await?;
        drive(response.bytes_stream(), self.stream_options(None), sink).await
    }

    /// Like [`send_chat`](ChatClient::send_chat), but reading stops as soon
    /// as `token` is cancelled.
    pub async fn send_chat_with_cancel<K>(
        &self,
        message: &str,
        token: CancellationToken,
        sink: &mut K,
    ) -> Result<(), ClientError>
    where
        K: ChunkSink + ?Sized,
    {
        let response = self.open(message).await?;
        drive(response.bytes_stream(), self.stream_options(Some(token)), sink).await
    }

    async fn open(&self, message: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.endpoint();
        info!(%url, chars = message.chars().count(), "sending chat request");

        let mut req = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(api_key) = &self.transport_options.api_key {
            req = req.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()));
        }

        req = add_extra_headers(req, &self.transport_options.extra_headers);

        let response = req.json(&ChatRequest::new(message)).send().await?;
        ensure_streamable(response).await
    }

    fn stream_options(&self, cancel: Option<CancellationToken>) -> StreamOptions {
        StreamOptions {
            read_timeout: self.transport_options.read_timeout,
            cancel,
        }
    }
}
