//! HidGuard Protocol - Wire messages and codec
//!
//! This crate defines the JSON messages exchanged with the HidGuard
//! gatekeeper:
//! - `AccessRequest`: server asks whether a process may open a device
//! - `RequestDecision`: client answer, allow or deny
//! - `Confirmation`: server report on whether the decision was applied
//!
//! Every message carries a `Header { Id, Kind }` envelope; `Kind` selects
//! the payload shape on inbound frames.

mod codec;
mod message;

pub use codec::*;
pub use message::*;
