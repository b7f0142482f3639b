//! HTTP transport seam.
//!
//! Fetchers never talk to `reqwest` directly. They send a
//! [`TransportRequest`] through a [`Transport`] and get back a
//! [`RawResponse`] whose body is still a stream, so the bounded reader can
//! stop before an oversized payload lands in memory.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{header, Client};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{FetchError, TransportFault};

/// Default total request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default user agent; many documentation sites reject obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// Request / Response
// ============================================================================

/// A GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Target URL.
    pub url: String,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Per-request total timeout, overriding the client default.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// A plain GET for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            timeout: None,
        }
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Sets the total timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the value of query parameter `key`, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Chunks of a response body.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, TransportFault>>;

/// A response whose body has not been read yet.
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Content-Length` header value.
    pub content_length: Option<String>,
    /// Charset declared in `Content-Type`.
    pub charset: Option<String>,
    /// Body chunks.
    pub body: BodyStream,
}

impl RawResponse {
    /// A response with an in-memory body delivered as one chunk.
    pub fn from_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status,
            content_length: Some(body.len().to_string()),
            charset: None,
            body: futures::stream::iter(vec![Ok(body)]).boxed(),
        }
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("charset", &self.charset)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Sends GET requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response head plus body stream.
    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, TransportFault>;
}

// ============================================================================
// reqwest Transport
// ============================================================================

/// Client settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Default total timeout per request.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User agent header.
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
}

impl HttpTransport {
    /// Builds the client.
    pub fn new(settings: &TransportSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { inner: client })
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, TransportFault> {
        debug!("GET request");

        let mut builder = self.inner.get(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        debug!(status = %response.status(), "Response received");

        let headers = response.headers();
        let content_length = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let charset = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);

        Ok(RawResponse {
            status: response.status().as_u16(),
            content_length,
            charset,
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TransportFault::from))
                .boxed(),
        })
    }
}

/// Extracts `charset=...` from a `Content-Type` value.
pub fn charset_from_content_type(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (name, val) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            let val = val.trim().trim_matches('"');
            (!val.is_empty()).then(|| val.to_string())
        } else {
            None
        }
    })
}

// ============================================================================
// Scripted Transport (tests)
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
