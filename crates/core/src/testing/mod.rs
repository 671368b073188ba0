//! Testing utilities for exercising the protocol without a real gate.
//!
//! # Example
//!
//! ```rust,ignore
//! use netfunnel_core::testing::{fixtures, MockRequester};
//!
//! let requester = MockRequester::new();
//! requester.push_response(200, fixtures::ticket_body("KEY", 0)).await;
//! ```

mod mock_requester;

pub use mock_requester::{MockRequester, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// Result token for `key` with `nwait` callers ahead, unquoted.
    pub fn result_token(key: &str, nwait: i64) -> String {
        format!(
            "5002:200:ip=nf.example.com&key={}&nnext=1&nwait={}&port=443&tps=10&ttl=5",
            urlencoding::encode(key),
            nwait
        )
    }

    /// Full ticket-request response body as the gate sends it.
    pub fn ticket_body(key: &str, nwait: i64) -> String {
        format!(
            "NetFunnel.gRtype=5101;NetFunnel.gControl.result='{}';",
            result_token(key, nwait)
        )
    }
}
