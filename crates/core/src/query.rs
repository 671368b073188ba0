//! Request URL construction for the gate opcodes.
//!
//! Every operation is a GET to the same endpoint; only the query parameters
//! differ. A millisecond timestamp is appended as a bare trailing segment to
//! defeat intermediate caches.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::config::GateConfig;

/// Gate operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Ask whether a queued key has been admitted (5002).
    CheckStatus,
    /// Request a new ticket (5101).
    RequestTicket,
    /// Release a ticket after use (5004).
    DispatchTicket,
}

impl Opcode {
    /// Numeric code sent in the `opcode` parameter.
    pub fn code(&self) -> u16 {
        match self {
            Opcode::CheckStatus => 5002,
            Opcode::RequestTicket => 5101,
            Opcode::DispatchTicket => 5004,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::CheckStatus => "status_check",
            Opcode::RequestTicket => "ticket_request",
            Opcode::DispatchTicket => "ticket_dispatch",
        }
    }

    /// Value of the `prefix` parameter, e.g. `NetFunnel.gRtype=5101;`.
    fn prefix(&self) -> String {
        format!("NetFunnel.gRtype={};", self.code())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Builds request URLs for one gate endpoint.
#[derive(Debug)]
pub struct QueryBuilder {
    endpoint: String,
    service_id: String,
    action_id: String,
    /// Last timestamp handed out, so suffixes never go backwards.
    last_stamp: AtomicI64,
}

impl QueryBuilder {
    /// Create a builder with explicit service and action ids.
    pub fn new(
        endpoint: impl Into<String>,
        service_id: impl Into<String>,
        action_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            service_id: service_id.into(),
            action_id: action_id.into(),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.endpoint.trim(),
            config.service_id.as_str(),
            config.action_id.as_str(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL for the status-check operation (5002).
    ///
    /// The accepted parameter set for this opcode has not been confirmed
    /// against every gate deployment.
    pub fn status_check_url(&self, key: &str) -> String {
        let opcode = Opcode::CheckStatus;
        self.build_url(vec![
            ("opcode", opcode.code().to_string()),
            ("key", key.to_string()),
            ("nfid", "0".to_string()),
            ("prefix", opcode.prefix()),
            ("ttl", "0".to_string()),
            ("js", "yes".to_string()),
        ])
    }

    /// URL for the ticket-request operation (5101).
    pub fn ticket_request_url(&self) -> String {
        let opcode = Opcode::RequestTicket;
        self.build_url(vec![
            ("opcode", opcode.code().to_string()),
            ("nfid", "0".to_string()),
            ("prefix", opcode.prefix()),
            ("sid", self.service_id.clone()),
            ("aid", self.action_id.clone()),
            ("js", "yes".to_string()),
        ])
    }

    /// URL for the ticket-dispatch operation (5004).
    pub fn ticket_dispatch_url(&self, key: &str) -> String {
        let opcode = Opcode::DispatchTicket;
        self.build_url(vec![
            ("opcode", opcode.code().to_string()),
            ("key", key.to_string()),
            ("nfid", "0".to_string()),
            ("prefix", opcode.prefix()),
            ("sid", self.service_id.clone()),
            ("aid", self.action_id.clone()),
            ("js", "yes".to_string()),
        ])
    }

    fn build_url(&self, params: Vec<(&'static str, String)>) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}&{}",
            self.endpoint,
            separator,
            encode_params(params),
            self.next_stamp()
        )
    }

    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_stamp.fetch_max(now, Ordering::Relaxed);
        previous.max(now)
    }
}

/// Percent-encode parameters into a query string, sorted by name.
///
/// Spaces become `%20`, not the form-style `+`; gates decode both.
pub fn encode_params(mut params: Vec<(&str, String)>) -> String {
    params.sort_by(|a, b| a.0.cmp(b.0));
    params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
