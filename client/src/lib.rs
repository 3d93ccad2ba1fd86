//! HidGuard Client Library
//!
//! Answers HidGuard gatekeeper access requests for one local process:
//! - `correlator`: lifecycle ledger keyed by request id
//! - `decision`: whitelist match for requests of the local process
//! - `handler`: per-frame decode, correlate, decide, reply
//! - `client`: connection-owning facade exposed to the embedding application

pub mod client;
pub mod config;
pub mod correlator;
pub mod decision;
pub mod handler;
pub mod whitelist;

pub use client::{ClientError, ClientOptions, HidGuardClient};
pub use correlator::{ConfirmationMode, Correlator, RequestStatus, StatusSummary};
pub use hidguard_protocol::RequestId;
