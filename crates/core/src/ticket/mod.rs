//! Admission tickets issued by the waiting-room gate.

mod types;

pub use types::Ticket;
