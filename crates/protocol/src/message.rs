//! Wire messages exchanged with the HidGuard gatekeeper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Discriminator value for [`AccessRequest`] frames
pub const KIND_ACCESS_REQUEST: &str = "AccessRequest";

/// Discriminator value for [`Confirmation`] frames
pub const KIND_CONFIRMATION: &str = "Confirmation";

/// Confirmation code signalling the server applied a decision
pub const CODE_OK: i64 = 200;

/// Correlation id assigned by the server to one request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// The all-zero id, never a valid correlation id
    pub const NIL: RequestId = RequestId(Uuid::nil());

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Envelope header present on every message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "Id")]
    pub id: RequestId,

    /// Message discriminator, omitted on outbound decisions
    #[serde(rename = "Kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Header {
    pub fn new(id: RequestId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: Some(kind.into()),
        }
    }

    /// Header carrying only the correlation id
    pub fn id_only(id: RequestId) -> Self {
        Self { id, kind: None }
    }
}

/// Server asks whether `process_id` may open the device described by `hardware_ids`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    #[serde(rename = "Header")]
    pub header: Header,

    #[serde(rename = "HardwareIds")]
    pub hardware_ids: Vec<String>,

    #[serde(rename = "DeviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(rename = "InstanceId", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(rename = "ProcessId")]
    pub process_id: i64,
}

impl AccessRequest {
    pub fn new(id: RequestId, process_id: i64, hardware_ids: Vec<String>) -> Self {
        Self {
            header: Header::new(id, KIND_ACCESS_REQUEST),
            hardware_ids,
            device_id: None,
            instance_id: None,
            process_id,
        }
    }

    pub fn id(&self) -> RequestId {
        self.header.id
    }
}

/// Client answer to an [`AccessRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDecision {
    #[serde(rename = "Header")]
    pub header: Header,

    #[serde(rename = "IsAllowed")]
    pub is_allowed: bool,

    /// Remember the decision for the lifetime of the device attachment
    #[serde(rename = "IsPermanent", default = "default_permanent")]
    pub is_permanent: bool,
}

fn default_permanent() -> bool {
    true
}

impl RequestDecision {
    /// Permanent decision for `id`
    pub fn new(id: RequestId, is_allowed: bool) -> Self {
        Self::with_permanence(id, is_allowed, true)
    }

    pub fn with_permanence(id: RequestId, is_allowed: bool, is_permanent: bool) -> Self {
        Self {
            header: Header::id_only(id),
            is_allowed,
            is_permanent,
        }
    }

    pub fn id(&self) -> RequestId {
        self.header.id
    }
}

/// Server report on whether a decision was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(rename = "Header")]
    pub header: Header,

    #[serde(rename = "Code")]
    pub code: i64,

    #[serde(rename = "Message", default)]
    pub message: String,
}

impl Confirmation {
    pub fn new(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            header: Header::new(id, KIND_CONFIRMATION),
            code,
            message: message.into(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.header.id
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_OK
    }
}
