//! Transport and stream configuration.

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::ClientError;

/// Where the chat service listens unless configured otherwise.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Path of the streaming chat endpoint.
pub const DEFAULT_CHAT_PATH: &str = "/chat";

const ENV_BASE_URL: &str = "SSECHAT_BASE_URL";
const ENV_CHAT_PATH: &str = "SSECHAT_CHAT_PATH";
const ENV_API_KEY: &str = "SSECHAT_API_KEY";
const ENV_TIMEOUT: &str = "SSECHAT_TIMEOUT_SECS";
const ENV_READ_TIMEOUT: &str = "SSECHAT_READ_TIMEOUT_SECS";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// HTTP transport options for the chat client.
///
/// # Example
/// ```rust
/// use ssechat::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::new()
///     .with_base_url("http://chat.internal:8080")
///     .with_read_timeout(Duration::from_secs(30));
///
/// assert_eq!(options.chat_path, "/chat");
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Scheme, host and port of the chat service
    pub base_url: String,

    /// Path of the chat endpoint, appended to `base_url`
    pub chat_path: String,

    /// Whole-request timeout, body included
    pub timeout: Option<Duration>,

    /// Longest wait for any single body fragment
    pub read_timeout: Option<Duration>,

    /// Sent as a bearer token when present
    pub api_key: Option<SecretString>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            timeout: None,
            read_timeout: None,
            api_key: None,
            proxy: None,
            extra_headers: None,
        }
    }
}

impl TransportOptions {
    /// Options pointing at the default local endpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from `SSECHAT_*` environment variables.
    ///
    /// Unset variables keep their defaults. Timeouts are whole seconds.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build options from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let mut options = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            options.base_url = base_url;
        }
        if let Some(chat_path) = lookup(ENV_CHAT_PATH) {
            options.chat_path = chat_path;
        }
        if let Some(api_key) = lookup(ENV_API_KEY).filter(|key| !key.is_empty()) {
            options.api_key = Some(api_key.into());
        }
        options.timeout = parse_secs(ENV_TIMEOUT, lookup(ENV_TIMEOUT))?;
        options.read_timeout = parse_secs(ENV_READ_TIMEOUT, lookup(ENV_READ_TIMEOUT))?;

        Ok(options)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the chat endpoint path.
    pub fn with_chat_path(mut self, chat_path: impl Into<String>) -> Self {
        self.chat_path = chat_path.into();
        self
    }

    /// Set the whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the per-fragment read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Full URL of the chat endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.chat_path)
    }
}

fn parse_secs(name: &str, value: Option<String>) -> Result<Option<Duration>, ClientError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ClientError::Config(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}

/// Per-stream controls for the chunk driver.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Fail with [`ClientError::ReadTimeout`] if a fragment takes longer
    pub read_timeout: Option<Duration>,

    /// Stop reading once cancelled; the final flush is skipped
    pub cancel: Option<CancellationToken>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
