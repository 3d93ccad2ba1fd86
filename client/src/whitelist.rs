//! Hardware id whitelist

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::info;

/// Append-only list of hardware ids this client approves for its own process
///
/// Safe to extend from any thread while requests are being decided.
#[derive(Debug, Default)]
pub struct Whitelist {
    ids: RwLock<Vec<String>>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append ids; duplicates are kept
    pub fn extend<I, S>(&self, hardware_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = self.ids.write();
        let before = ids.len();
        ids.extend(hardware_ids.into_iter().map(Into::into));
        info!("Whitelisted {} hardware id(s)", ids.len() - before);
    }

    /// Read access for deciding a request
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.ids.read()
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Whitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: RwLock::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}
