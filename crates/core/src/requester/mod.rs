//! Outbound HTTP abstraction.
//!
//! This module provides an `HttpRequester` trait so the protocol client can
//! run against reqwest in production and scripted mocks in tests.

mod http_client;
mod types;

pub use http_client::ReqwestRequester;
pub use types::*;
