//! HTTP Client Abstraction
//!
//! Provides streaming HTTP transfers: the caller receives the status code and
//! the advertised content length up front, then pulls the body in bounded
//! chunks at its own pace.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn user_agent(self, agent: impl Into<String>) -> Self {
        self.header("User-Agent", agent)
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Response whose body has not been read yet.
///
/// `content_length` is `None` when the server did not advertise a length; the
/// body must then be read until it reports end of stream.
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub content_length: Option<u64>,
    pub body: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .field("body", &"AsyncRead { ... }")
            .finish()
    }
}

/// Async HTTP client trait
///
/// Implementations should handle TLS, redirects and connection reuse. They
/// must not buffer the body: `open_stream` returns as soon as the status line
/// and headers are available.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
/// use tokio::io::AsyncReadExt;
///
/// async fn first_kilobyte(client: &dyn HttpClient) -> Result<Vec<u8>> {
///     let mut response = client
///         .open_stream(HttpRequest::get("https://example.com/a.mp3"))
///         .await?;
///     let mut buf = vec![0u8; 1024];
///     let n = response.body.read(&mut buf).await?;
///     buf.truncate(n);
///     Ok(buf)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send the request and return once headers have been received.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be established, TLS validation
    /// fails or the request times out. Non-2xx statuses are not errors.
    async fn open_stream(&self, request: HttpRequest) -> Result<StreamingResponse>;
}
