//! Ticket acquisition protocol.
//!
//! A ticket request either grants admission immediately (HTTP 200) or queues
//! the caller (HTTP 201). Queued callers poll the status-check opcode with the
//! ticket key until the gate answers 200, then use the protected API and
//! finally dispatch the ticket so the slot can be reclaimed.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::GateConfig;
use crate::decoder::{decode_body, DecodeError};
use crate::query::{Opcode, QueryBuilder};
use crate::requester::{HttpRequester, HttpResponse, RequestError, ReqwestRequester};
use crate::ticket::Ticket;

/// Status meaning "served now".
const STATUS_ADMITTED: u16 = 200;
/// Status meaning "queued, keep polling".
const STATUS_QUEUED: u16 = 201;

/// Errors returned by the protocol operations.
#[derive(Debug, Error)]
pub enum NetFunnelError {
    /// `queued_key` is set when the failure interrupted a wait in the queue.
    #[error("Failed to reach the gate during {opcode}: {source}")]
    Connectivity {
        opcode: Opcode,
        #[source]
        source: RequestError,
        queued_key: Option<String>,
    },

    #[error("Unexpected HTTP status during {opcode}: HTTP {status}")]
    UnexpectedStatus { opcode: Opcode, status: u16 },

    #[error("Failed to decode ticket response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Waiting for admission of {key} was cancelled")]
    Cancelled { key: String },

    #[error("Still queued after waiting {waited:?} (key {key})")]
    WaitTimeout { waited: Duration, key: String },
}

impl NetFunnelError {
    /// HTTP status carried by an `UnexpectedStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetFunnelError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the gate could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, NetFunnelError::Connectivity { .. })
    }

    /// Key of a queue slot still held at the gate when the wait was abandoned.
    ///
    /// Pass it to [`NetFunnelClient::release_key`] to free the slot.
    pub fn queued_key(&self) -> Option<&str> {
        match self {
            NetFunnelError::Cancelled { key } | NetFunnelError::WaitTimeout { key, .. } => {
                Some(key)
            }
            NetFunnelError::Connectivity { queued_key, .. } => queued_key.as_deref(),
            _ => None,
        }
    }

    fn while_queued(self, key: &str) -> Self {
        match self {
            NetFunnelError::Connectivity { opcode, source, .. } => NetFunnelError::Connectivity {
                opcode,
                source,
                queued_key: Some(key.to_string()),
            },
            other => other,
        }
    }
}

/// Client for one gate endpoint.
///
/// Holds only immutable configuration and the requester, so a single client
/// can serve concurrent acquisitions for different tickets.
#[derive(Debug)]
pub struct NetFunnelClient<R = ReqwestRequester> {
    requester: R,
    queries: QueryBuilder,
    retry_interval: Duration,
    max_wait: Option<Duration>,
}

impl NetFunnelClient<ReqwestRequester> {
    /// Create a client that talks to the gate over reqwest.
    pub fn new(config: &GateConfig) -> Result<Self, RequestError> {
        let requester = ReqwestRequester::from_config(config)?;
        Ok(Self::with_requester(config, requester))
    }
}

impl<R: HttpRequester> NetFunnelClient<R> {
    /// Create a client with a custom requester.
    pub fn with_requester(config: &GateConfig, requester: R) -> Self {
        Self {
            requester,
            queries: QueryBuilder::from_config(config),
            retry_interval: config.retry_interval(),
            max_wait: config.max_wait(),
        }
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Check whether a queued key has been admitted.
    ///
    /// Returns the raw HTTP status; 200 means admitted. The body is ignored.
    pub async fn check_status(&self, key: &str) -> Result<u16, NetFunnelError> {
        let url = self.queries.status_check_url(key);
        let response = self.send(Opcode::CheckStatus, &url).await?;
        Ok(response.status)
    }

    /// Request a ticket, waiting in the queue if necessary.
    ///
    /// The wait is bounded only by `max_wait_secs` from the configuration.
    /// Use [`acquire_ticket_with_cancel`](Self::acquire_ticket_with_cancel)
    /// to abort it from outside.
    pub async fn acquire_ticket(&self) -> Result<Ticket, NetFunnelError> {
        self.acquire_ticket_with_cancel(&CancellationToken::new())
            .await
    }

    /// Request a ticket, waiting in the queue until admitted or cancelled.
    pub async fn acquire_ticket_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Ticket, NetFunnelError> {
        let opcode = Opcode::RequestTicket;
        let url = self.queries.ticket_request_url();
        let response = self.send(opcode, &url).await?;

        if response.status != STATUS_ADMITTED && response.status != STATUS_QUEUED {
            return Err(NetFunnelError::UnexpectedStatus {
                opcode,
                status: response.status,
            });
        }

        // Both the admitted and the queued answer carry the ticket token.
        let ticket = decode_body(&response.body)?;

        if response.status == STATUS_ADMITTED {
            info!(key = ticket.key(), "Ticket granted immediately");
            return Ok(ticket);
        }

        info!(
            key = ticket.key(),
            nwait = ticket.nwait(),
            estimated_wait = ?ticket.estimated_wait(),
            "Queued by the gate, waiting for admission"
        );
        let attempts = self.wait_for_admission(ticket.key(), cancel).await?;
        info!(key = ticket.key(), attempts, "Ticket granted after waiting");
        Ok(ticket)
    }

    /// Release a ticket after use.
    pub async fn release_ticket(&self, ticket: &Ticket) -> Result<(), NetFunnelError> {
        self.release_key(ticket.key()).await
    }

    /// Release the ticket identified by `key`.
    ///
    /// Useful when only the key was kept, e.g. across process boundaries.
    pub async fn release_key(&self, key: &str) -> Result<(), NetFunnelError> {
        let opcode = Opcode::DispatchTicket;
        let url = self.queries.ticket_dispatch_url(key);
        let response = self.send(opcode, &url).await?;

        match response.status {
            STATUS_ADMITTED => {
                info!(key, "Ticket released");
                Ok(())
            }
            status => Err(NetFunnelError::UnexpectedStatus { opcode, status }),
        }
    }

    /// Poll until the gate admits `key`, returning the number of checks made.
    ///
    /// Every error returned here carries `key` in [`NetFunnelError::queued_key`].
    async fn wait_for_admission(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<u32, NetFunnelError> {
        match self.max_wait {
            Some(limit) => tokio::time::timeout(limit, self.poll_status(key, cancel))
                .await
                .map_err(|_| NetFunnelError::WaitTimeout {
                    waited: limit,
                    key: key.to_string(),
                })?,
            None => self.poll_status(key, cancel).await,
        }
    }

    async fn poll_status(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<u32, NetFunnelError> {
        let mut attempts = 0u32;
        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(key)),
                status = self.check_status(key) => status.map_err(|e| e.while_queued(key))?,
            };
            attempts += 1;

            if status == STATUS_ADMITTED {
                return Ok(attempts);
            }
            debug!(key, status, attempt = attempts, "Still queued");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(key)),
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    async fn send(&self, opcode: Opcode, url: &str) -> Result<HttpResponse, NetFunnelError> {
        debug!(%opcode, url, "Sending gate request");
        self.requester
            .get(url)
            .await
            .map_err(|source| NetFunnelError::Connectivity {
                opcode,
                source,
                queued_key: None,
            })
    }
}

fn cancelled(key: &str) -> NetFunnelError {
    NetFunnelError::Cancelled {
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockRequester};

    fn client(requester: MockRequester) -> NetFunnelClient<MockRequester> {
        let mut config = GateConfig::new("https://nf.example.com/ts.wseq");
        config.retry_interval_ms = 10;
        NetFunnelClient::with_requester(&config, requester)
    }

    #[tokio::test]
    async fn test_check_status_returns_raw_code() {
        let requester = MockRequester::new();
        requester.push_status(201).await;
        let client = client(requester);

        assert_eq!(client.check_status("KEY").await.unwrap(), 201);

        let urls = client.requester().recorded_urls().await;
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("opcode=5002"));
        assert!(urls[0].contains("key=KEY"));
    }

    #[tokio::test]
    async fn test_check_status_ignores_garbage_body() {
        let requester = MockRequester::new();
        requester.push_response(200, "not a ticket at all").await;
        let client = client(requester);

        assert_eq!(client.check_status("KEY").await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_check_status_connectivity_error() {
        let requester = MockRequester::new();
        requester
            .push_error(RequestError::ConnectionFailed("refused".to_string()))
            .await;
        let client = client(requester);

        let err = client.check_status("KEY").await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(err.queued_key(), None);
        assert!(matches!(
            err,
            NetFunnelError::Connectivity {
                opcode: Opcode::CheckStatus,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_acquire_decode_failure_is_not_retried() {
        let requester = MockRequester::new();
        requester
            .push_response(200, "NetFunnel.gRtype=5101;")
            .await;
        let client = client(requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::Decode(DecodeError::MissingResult)
        ));
        assert_eq!(client.requester().request_count().await, 1);
    }

    #[tokio::test]
    async fn test_acquire_unexpected_status_with_error_page() {
        let requester = MockRequester::new();
        requester.push_response(503, "Service Unavailable").await;
        let client = client(requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::UnexpectedStatus {
                opcode: Opcode::RequestTicket,
                status: 503
            }
        ));
    }

    #[tokio::test]
    async fn test_acquire_rejects_invalid_utf8_key() {
        let requester = MockRequester::new();
        let mut body = b"NetFunnel.gControl.result='5101:201:ip=a&key=AB".to_vec();
        body.push(0xff);
        body.extend_from_slice(b"&nnext=0&nwait=1&port=80&tps=1&ttl=1';");
        requester.push_response(200, body).await;
        let client = client(requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::Decode(DecodeError::InvalidEncoding(_))
        ));
        assert_eq!(err.queued_key(), None);
    }

    #[tokio::test]
    async fn test_acquire_queued_with_undecodable_body_does_not_poll() {
        let requester = MockRequester::new();
        requester.push_response(201, "NetFunnel.gControl.result='1:2';").await;
        let client = client(requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::Decode(DecodeError::MalformedResult(_))
        ));
        assert_eq!(client.requester().request_count().await, 1);
    }

    #[tokio::test]
    async fn test_acquire_unexpected_status() {
        let requester = MockRequester::new();
        requester
            .push_response(302, fixtures::ticket_body("KEY", 0))
            .await;
        let client = client(requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert_eq!(err.status(), Some(302));
        assert!(err.to_string().contains("HTTP 302"));
    }

    #[tokio::test]
    async fn test_acquire_connectivity_error_during_poll_aborts() {
        let requester = MockRequester::new();
        requester
            .push_response(201, fixtures::ticket_body("KEY", 3))
            .await;
        requester.push_status(201).await;
        requester.push_error(RequestError::Timeout).await;
        requester.push_status(200).await;
        let client = client(requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::Connectivity {
                opcode: Opcode::CheckStatus,
                source: RequestError::Timeout,
                ..
            }
        ));
        assert_eq!(err.queued_key(), Some("KEY"));
        assert_eq!(client.requester().request_count().await, 3);
    }

    #[tokio::test]
    async fn test_acquire_cancelled_while_queued() {
        let requester = MockRequester::new();
        requester
            .push_response(201, fixtures::ticket_body("KEY", 3))
            .await;
        requester.set_default_status(201).await;
        let client = client(requester);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client.acquire_ticket_with_cancel(&cancel).await.unwrap_err();
        assert!(matches!(err, NetFunnelError::Cancelled { ref key } if key == "KEY"));
        assert_eq!(err.queued_key(), Some("KEY"));
    }

    #[tokio::test]
    async fn test_acquire_already_cancelled_still_returns_immediate_grant() {
        let requester = MockRequester::new();
        requester
            .push_response(200, fixtures::ticket_body("KEY", 0))
            .await;
        let client = client(requester);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let ticket = client.acquire_ticket_with_cancel(&cancel).await.unwrap();
        assert_eq!(ticket.key(), "KEY");
    }

    #[tokio::test]
    async fn test_acquire_max_wait_exceeded() {
        let requester = MockRequester::new();
        requester
            .push_response(201, fixtures::ticket_body("KEY", 3))
            .await;
        requester.set_default_status(201).await;

        let mut config = GateConfig::new("https://nf.example.com/ts.wseq");
        config.retry_interval_ms = 10;
        config.max_wait_secs = Some(1);
        let client = NetFunnelClient::with_requester(&config, requester);

        let err = client.acquire_ticket().await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::WaitTimeout { waited, .. } if waited == Duration::from_secs(1)
        ));
        assert_eq!(err.queued_key(), Some("KEY"));
    }

    #[tokio::test]
    async fn test_release_key_sends_dispatch() {
        let requester = MockRequester::new();
        requester.push_status(200).await;
        let client = client(requester);

        client.release_key("KEY 1").await.unwrap();

        let urls = client.requester().recorded_urls().await;
        assert!(urls[0].contains("opcode=5004"));
        assert!(urls[0].contains("key=KEY%201"));
    }

    #[tokio::test]
    async fn test_release_connectivity_error() {
        let requester = MockRequester::new();
        requester
            .push_error(RequestError::ConnectionFailed("reset".to_string()))
            .await;
        let client = client(requester);

        let err = client.release_key("KEY").await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_release_rejects_queued_status() {
        let requester = MockRequester::new();
        requester.push_status(201).await;
        let client = client(requester);

        let err = client.release_key("KEY").await.unwrap_err();
        assert!(matches!(
            err,
            NetFunnelError::UnexpectedStatus {
                opcode: Opcode::DispatchTicket,
                status: 201
            }
        ));
    }
}
