//! HTTP client utilities for talking to the chat service.
//!
//! Client construction, header handling and response classification live
//! here so the client module only deals with the request flow.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::collections::HashMap;
use tracing::warn;

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
///
/// This applies the request timeout and proxy.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&transport_options)?;
/// ```
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
///
/// # Example
/// ```ignore
/// let mut req = client.post(url);
/// req = add_extra_headers(req, &transport_options.extra_headers);
/// ```
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Reject responses whose body must not be decoded.
///
/// A non-success status fails with the status and whatever body the server
/// sent. A success status that carries no body (204, 205) fails as well.
pub async fn ensure_streamable(response: Response) -> Result<Response, ClientError> {
    let status = response.status();

    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%status, error = %err, "failed to read error body");
                String::new()
            }
        };
        warn!(%status, "chat request rejected");
        return Err(ClientError::Status { status, body });
    }

    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        warn!(%status, "chat response has no body");
        return Err(ClientError::MissingBody(status));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let transport_options = TransportOptions::new().with_timeout(Duration::from_secs(30));

        let client = build_http_client(&transport_options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport_options =
            TransportOptions::new().with_proxy("http://proxy.example.com:8080".to_string());

        let client = build_http_client(&transport_options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_add_extra_headers() {
        let client = Client::new();
        let options = TransportOptions::new().with_header("x-trace".to_string(), "abc".to_string());

        let request = add_extra_headers(client.post("http://localhost/chat"), &options.extra_headers)
            .build()
            .unwrap();
        assert_eq!(request.headers()["x-trace"], "abc");
    }
}
