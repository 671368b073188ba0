//! Types for outbound HTTP requests.

use std::str::Utf8Error;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while performing a request.
///
/// All variants mean the exchange with the gate did not complete; protocol
/// level failures are reported by the caller based on [`HttpResponse::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read response body: {0}")]
    BodyRead(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body as text. Fails on invalid UTF-8.
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

/// Capability to issue a GET request.
#[async_trait]
pub trait HttpRequester: Send + Sync {
    /// Perform a GET request and return the status and body.
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError>;
}

#[async_trait]
impl<T: HttpRequester + ?Sized> HttpRequester for Arc<T> {
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        (**self).get(url).await
    }
}
