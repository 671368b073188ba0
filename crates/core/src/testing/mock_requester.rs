//! Mock HTTP requester for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::requester::{HttpRequester, HttpResponse, RequestError};

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The requested URL.
    pub url: String,
    /// When the request was made.
    pub timestamp: Instant,
}

/// Mock implementation of the HttpRequester trait.
///
/// Provides controllable behavior for testing:
/// - Replay scripted responses and errors in order
/// - Fall back to a default status once the script runs out
/// - Track requested URLs and their timing for assertions
///
/// # Example
///
/// ```rust,ignore
/// use netfunnel_core::testing::{fixtures, MockRequester};
///
/// let requester = MockRequester::new();
/// requester.push_response(201, fixtures::ticket_body("KEY", 5)).await;
/// requester.push_status(200).await;
///
/// let client = NetFunnelClient::with_requester(&config, requester);
/// let ticket = client.acquire_ticket().await?;
///
/// assert_eq!(client.requester().request_count().await, 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockRequester {
    /// Scripted outcomes, consumed front to back.
    script: Arc<RwLock<VecDeque<Result<HttpResponse, RequestError>>>>,
    /// Status returned with an empty body once the script is exhausted.
    default_status: Arc<RwLock<Option<u16>>>,
    /// Recorded requests.
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
}

impl Default for MockRequester {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRequester {
    /// Create a mock requester with an empty script.
    ///
    /// Requests made with nothing scripted fail with a connection error.
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(VecDeque::new())),
            default_status: Arc::new(RwLock::new(None)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue a response with the given status and body.
    pub async fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.script
            .write()
            .await
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queue a response with the given status and an empty body.
    pub async fn push_status(&self, status: u16) {
        self.push_response(status, Vec::new()).await;
    }

    /// Queue a transport failure.
    pub async fn push_error(&self, error: RequestError) {
        self.script.write().await.push_back(Err(error));
    }

    /// Answer with `status` whenever the script is exhausted.
    pub async fn set_default_status(&self, status: u16) {
        *self.default_status.write().await = Some(status);
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Get the URLs of all recorded requests.
    pub async fn recorded_urls(&self) -> Vec<String> {
        self.requests
            .read()
            .await
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Number of scripted outcomes not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.script.read().await.len()
    }
}

#[async_trait]
impl HttpRequester for MockRequester {
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        self.requests.write().await.push(RecordedRequest {
            url: url.to_string(),
            timestamp: Instant::now(),
        });

        if let Some(outcome) = self.script.write().await.pop_front() {
            return outcome;
        }

        match *self.default_status.read().await {
            Some(status) => Ok(HttpResponse::new(status, Vec::new())),
            None => Err(RequestError::ConnectionFailed(
                "no scripted response left".to_string(),
            )),
        }
    }
}
