//! Ticket data type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single admission grant issued by the gate.
///
/// Tickets are only produced by decoding a ticket-request response and are
/// read-only afterwards. Hold on to the value for as long as the protected
/// API is in use, then hand it back to
/// [`NetFunnelClient::release_ticket`](crate::NetFunnelClient::release_ticket).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: String,
    ip: String,
    key: String,
    nnext: i64,
    nwait: i64,
    port: i64,
    tps: i64,
    ttl: i64,
}

impl Ticket {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        ip: String,
        key: String,
        nnext: i64,
        nwait: i64,
        port: i64,
        tps: i64,
        ttl: i64,
    ) -> Self {
        Self {
            id,
            ip,
            key,
            nnext,
            nwait,
            port,
            tps,
            ttl,
        }
    }

    /// Raw result token, unquoted (`<int>:<int>:<query>`).
    ///
    /// Some protected APIs expect this value to be forwarded verbatim.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Host of the downstream service instance.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Queue key used for status checks and dispatch.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next-poll position hint.
    pub fn nnext(&self) -> i64 {
        self.nnext
    }

    /// Number of callers waiting ahead.
    pub fn nwait(&self) -> i64 {
        self.nwait
    }

    /// Port of the downstream service instance.
    pub fn port(&self) -> i64 {
        self.port
    }

    /// Admission throughput hint (transactions per second).
    pub fn tps(&self) -> i64 {
        self.tps
    }

    /// Time-to-live hint.
    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    /// Downstream service address as `ip:port`.
    pub fn service_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Rough time until admission, derived from `nwait / tps`.
    ///
    /// Returns `None` when the gate reports no throughput.
    pub fn estimated_wait(&self) -> Option<Duration> {
        if self.tps <= 0 {
            return None;
        }
        let waiting = self.nwait.max(0) as f64;
        Some(Duration::from_secs_f64(waiting / self.tps as f64))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticket {} ({}, nwait={}, tps={}, ttl={})",
            self.key,
            self.service_addr(),
            self.nwait,
            self.tps,
            self.ttl
        )
    }
}
