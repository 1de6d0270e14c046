//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, StreamingResponse},
};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - TLS support by default
/// - Bodies exposed as an `AsyncRead` over the response byte stream
///
/// The client carries no total deadline: the download queue drains a body
/// one chunk per poll, so a transfer may legitimately stay open for minutes.
/// Only a stalled connection or body read is cut off. `HttpRequest::timeout`
/// still sets a per-request total deadline when a caller wants one.
pub struct ReqwestHttpClient {
    client: Client,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl ReqwestHttpClient {
    /// Create a new HTTP client that gives up on a read stalled for 30 s
    pub fn new() -> Result<Self> {
        Self::with_read_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with a custom stall bound
    pub fn with_read_timeout(read_timeout: Duration) -> Result<Self> {
        let client = Self::builder(read_timeout).build().map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    fn builder(read_timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .read_timeout(read_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn map_send_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::OperationFailed("Request timed out".to_string())
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn open_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        debug!(method = ?request.method, "Opening HTTP stream");

        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "HTTP request failed");
                Self::map_send_error(e)
            })?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        debug!(status, content_length = ?content_length, "HTTP headers received");

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(StreamingResponse {
            status,
            headers,
            content_length,
            body: Box::new(reader),
        })
    }
}
