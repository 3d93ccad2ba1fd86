//! Decision engine

use hidguard_protocol::AccessRequest;

/// Whether `request` was raised on behalf of the local process
///
/// Only such requests are decided; the client takes no position on the
/// device access of other processes.
pub fn is_own_request(request: &AccessRequest, local_pid: u32) -> bool {
    request.process_id == i64::from(local_pid)
}

/// Allow iff at least one hardware id on the request is whitelisted
///
/// Exact, case-sensitive string comparison.
pub fn decide(request: &AccessRequest, whitelist: &[String]) -> bool {
    request
        .hardware_ids
        .iter()
        .any(|hardware_id| whitelist.contains(hardware_id))
}
