//! Client for the NetFunnel virtual waiting-room protocol.
//!
//! The gate sits in front of a web API and hands out admission tickets.
//! [`NetFunnelClient`] requests a ticket, waits in the queue when told to,
//! and dispatches the ticket once the caller is done.

pub mod client;
pub mod config;
pub mod decoder;
pub mod query;
pub mod requester;
pub mod testing;
pub mod ticket;

pub use client::{NetFunnelClient, NetFunnelError};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, GateConfig,
};
pub use decoder::{decode_body, decode_ticket, DecodeError};
pub use query::{Opcode, QueryBuilder};
pub use requester::{HttpRequester, HttpResponse, RequestError, ReqwestRequester};
pub use ticket::Ticket;
