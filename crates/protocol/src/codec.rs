//! Text frame codec
//!
//! Inbound frames are decoded in two steps: the `Header` envelope is read
//! first to obtain the `Kind` discriminator, then the whole payload is
//! decoded into the variant that discriminator selects. A shape mismatch
//! fails the whole frame.

use crate::message::{
    AccessRequest, Confirmation, Header, KIND_ACCESS_REQUEST, KIND_CONFIRMATION, RequestDecision,
    RequestId,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Reasons an inbound frame is not a recognized gatekeeper message
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Missing Header envelope")]
    MissingHeader,

    #[error("Invalid Header envelope: {0}")]
    InvalidHeader(#[source] serde_json::Error),

    #[error("Header has no Kind")]
    MissingKind,

    #[error("Unknown message kind: {0}")]
    UnknownKind(String),

    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    AccessRequest(AccessRequest),
    Confirmation(Confirmation),
}

impl InboundMessage {
    pub fn id(&self) -> RequestId {
        match self {
            InboundMessage::AccessRequest(request) => request.id(),
            InboundMessage::Confirmation(confirmation) => confirmation.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::AccessRequest(_) => KIND_ACCESS_REQUEST,
            InboundMessage::Confirmation(_) => KIND_CONFIRMATION,
        }
    }
}

/// Decode a text frame received from the gatekeeper
pub fn decode_inbound(text: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let header = value
        .as_object()
        .ok_or(DecodeError::NotAnObject)?
        .get("Header")
        .ok_or(DecodeError::MissingHeader)?;
    let header = Header::deserialize(header).map_err(DecodeError::InvalidHeader)?;

    match header.kind.as_deref() {
        Some(KIND_ACCESS_REQUEST) => {
            decode_payload(value, KIND_ACCESS_REQUEST).map(InboundMessage::AccessRequest)
        }
        Some(KIND_CONFIRMATION) => {
            decode_payload(value, KIND_CONFIRMATION).map(InboundMessage::Confirmation)
        }
        Some(other) => Err(DecodeError::UnknownKind(other.to_string())),
        None => Err(DecodeError::MissingKind),
    }
}

fn decode_payload<T: DeserializeOwned>(value: Value, kind: &'static str) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Encode a decision for transmission
pub fn encode_decision(decision: &RequestDecision) -> String {
    // Only string keys and plain values; serialization cannot fail
    serde_json::to_string(decision).expect("RequestDecision serializes to JSON")
}
