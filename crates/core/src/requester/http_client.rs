//! reqwest-backed requester.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::GateConfig;

use super::{HttpRequester, HttpResponse, RequestError};

/// Requester issuing real HTTP GETs through reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestRequester {
    client: Client,
}

impl ReqwestRequester {
    /// Create a requester with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &GateConfig) -> Result<Self, RequestError> {
        Self::new(config.request_timeout())
    }
}

#[async_trait]
impl HttpRequester for ReqwestRequester {
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::Timeout
            } else {
                RequestError::BodyRead(e.to_string())
            }
        })?;

        debug!(status, bytes = body.len(), "Gate responded");

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

fn map_send_error(e: reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout
    } else if e.is_builder() {
        RequestError::Client(e.to_string())
    } else {
        RequestError::ConnectionFailed(e.to_string())
    }
}
