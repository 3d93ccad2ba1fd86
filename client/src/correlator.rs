//! Request correlator
//!
//! Passive ledger mapping each [`RequestId`] seen on the connection to its
//! lifecycle status. It records values; the request handler decides them.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hidguard_protocol::RequestId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lifecycle of one request
///
/// `Received -> (Accepted | Rejected) -> Processing -> (Processed | Error)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Received,
    Accepted,
    Rejected,
    Processing,
    Processed,
    Error,
}

impl RequestStatus {
    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Processed | RequestStatus::Error)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Received => "received",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Processing => "processing",
            RequestStatus::Processed => "processed",
            RequestStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Which entries a confirmation is allowed to update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmationMode {
    /// Only ids with no entry yet; tracked requests keep their status
    #[default]
    UntrackedOnly,

    /// Untracked ids and requests waiting in `Processing`
    Tracked,
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    status: RequestStatus,
    updated_at: Instant,
}

impl Tracked {
    fn new(status: RequestStatus) -> Self {
        Self {
            status,
            updated_at: Instant::now(),
        }
    }
}

/// Counts of tracked requests per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub received: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub processing: usize,
    pub processed: usize,
    pub error: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.received + self.accepted + self.rejected + self.processing + self.processed + self.error
    }

    fn count(&mut self, status: RequestStatus) {
        match status {
            RequestStatus::Received => self.received += 1,
            RequestStatus::Accepted => self.accepted += 1,
            RequestStatus::Rejected => self.rejected += 1,
            RequestStatus::Processing => self.processing += 1,
            RequestStatus::Processed => self.processed += 1,
            RequestStatus::Error => self.error += 1,
        }
    }
}

/// Thread-safe map of request id -> lifecycle status
#[derive(Default)]
pub struct Correlator {
    entries: DashMap<RequestId, Tracked>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record `Received` for an unseen id
    /// Returns true if the id was not tracked before
    pub fn ensure_tracked(&self, id: RequestId) -> bool {
        match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Tracked::new(RequestStatus::Received));
                debug!(request = %id, "Tracking request");
                true
            }
        }
    }

    /// Overwrite the status of `id`
    pub fn set_status(&self, id: RequestId, status: RequestStatus) {
        self.entries.insert(id, Tracked::new(status));
        debug!(request = %id, %status, "Request status changed");
    }

    /// Current status, `None` when the id is unknown
    pub fn status(&self, id: &RequestId) -> Option<RequestStatus> {
        self.entries.get(id).map(|entry| entry.status)
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    /// Apply a confirmation outcome under `mode`
    /// Returns true if the status was written
    pub fn confirm(&self, id: RequestId, outcome: RequestStatus, mode: ConfirmationMode) -> bool {
        let applied = match self.entries.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(Tracked::new(outcome));
                true
            }
            Entry::Occupied(mut slot) => {
                if mode == ConfirmationMode::Tracked
                    && slot.get().status == RequestStatus::Processing
                {
                    slot.insert(Tracked::new(outcome));
                    true
                } else {
                    false
                }
            }
        };

        if applied {
            debug!(request = %id, status = %outcome, "Confirmation recorded");
        }
        applied
    }

    /// Drop terminal entries not updated within `max_age`
    /// Returns the number of evicted entries
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !(entry.status.is_terminal() && now.duration_since(entry.updated_at) >= max_age)
        });
        before.saturating_sub(self.entries.len())
    }

    /// All tracked ids with their status
    pub fn snapshot(&self) -> Vec<(RequestId, RequestStatus)> {
        self.entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().status))
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for entry in self.entries.iter() {
            summary.count(entry.status);
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
