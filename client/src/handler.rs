//! Inbound frame handler
//!
//! Runs each frame to completion: decode, correlate, decide, reply. Frames
//! that are not gatekeeper messages are dropped without touching state.

use crate::correlator::{ConfirmationMode, Correlator, RequestStatus};
use crate::decision;
use crate::whitelist::Whitelist;
use hidguard_protocol::{
    AccessRequest, Confirmation, InboundMessage, RequestDecision, decode_inbound, encode_decision,
};
use hidguard_transport::{FrameHandler, MessageSink};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Decision policy and shared state behind the connection
pub struct RequestHandler {
    process_id: u32,
    permanent: bool,
    confirmation: ConfirmationMode,
    whitelist: Arc<Whitelist>,
    correlator: Arc<Correlator>,
}

impl RequestHandler {
    pub fn new(process_id: u32, whitelist: Arc<Whitelist>, correlator: Arc<Correlator>) -> Self {
        Self {
            process_id,
            permanent: true,
            confirmation: ConfirmationMode::default(),
            whitelist,
            correlator,
        }
    }

    /// Value sent as `IsPermanent` on every decision
    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn with_confirmation_mode(mut self, mode: ConfirmationMode) -> Self {
        self.confirmation = mode;
        self
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn whitelist(&self) -> &Arc<Whitelist> {
        &self.whitelist
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Process one inbound text frame
    pub fn handle_frame(&self, text: &str, sink: &dyn MessageSink) {
        match decode_inbound(text) {
            Ok(InboundMessage::AccessRequest(request)) => self.handle_access_request(request, sink),
            Ok(InboundMessage::Confirmation(confirmation)) => {
                self.handle_confirmation(confirmation)
            }
            Err(e) => trace!("Dropping unrecognized frame: {}", e),
        }
    }

    fn handle_access_request(&self, request: AccessRequest, sink: &dyn MessageSink) {
        let id = request.id();

        if !self.correlator.ensure_tracked(id) {
            debug!(request = %id, "Duplicate access request ignored");
            return;
        }

        if !decision::is_own_request(&request, self.process_id) {
            trace!(
                request = %id,
                pid = request.process_id,
                "Access request for another process"
            );
            return;
        }

        let allowed = decision::decide(&request, &self.whitelist.read());
        let status = if allowed {
            RequestStatus::Accepted
        } else {
            RequestStatus::Rejected
        };
        self.correlator.set_status(id, status);

        info!(
            request = %id,
            device = request.device_id.as_deref().unwrap_or("-"),
            allowed,
            "Access request decided"
        );

        let reply = RequestDecision::with_permanence(id, allowed, self.permanent);
        match sink.send_text(encode_decision(&reply)) {
            Ok(()) => self.correlator.set_status(id, RequestStatus::Processing),
            Err(e) => warn!(request = %id, "Failed to send decision: {}", e),
        }
    }

    fn handle_confirmation(&self, confirmation: Confirmation) {
        let id = confirmation.id();
        if id.is_nil() {
            trace!("Ignoring confirmation with empty id");
            return;
        }

        let outcome = if confirmation.is_success() {
            RequestStatus::Processed
        } else {
            RequestStatus::Error
        };

        if !self.correlator.confirm(id, outcome, self.confirmation) {
            debug!(
                request = %id,
                code = confirmation.code,
                "Confirmation left tracked request unchanged"
            );
        } else if outcome == RequestStatus::Error {
            warn!(
                request = %id,
                code = confirmation.code,
                "Gatekeeper rejected decision: {}",
                confirmation.message
            );
        }
    }
}

impl FrameHandler for RequestHandler {
    fn on_text(&self, text: &str, sink: &dyn MessageSink) {
        self.handle_frame(text, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidguard_protocol::RequestId;
    use hidguard_transport::SendError;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    const LOCAL_PID: u32 = 1234;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        closed: bool,
    }

    impl MessageSink for RecordingSink {
        fn send_text(&self, text: String) -> Result<(), SendError> {
            if self.closed {
                return Err(SendError::ConnectionClosed);
            }
            self.sent.lock().push(text);
            Ok(())
        }
    }

    impl RecordingSink {
        fn decisions(&self) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .map(|text| serde_json::from_str(text).unwrap())
                .collect()
        }
    }

    fn handler(whitelist: &[&str]) -> RequestHandler {
        RequestHandler::new(
            LOCAL_PID,
            Arc::new(whitelist.iter().copied().collect()),
            Arc::new(Correlator::new()),
        )
    }

    fn access_request(id: RequestId, pid: u32, hardware_ids: &[&str]) -> String {
        json!({
            "Header": { "Id": id.to_string(), "Kind": "AccessRequest" },
            "HardwareIds": hardware_ids,
            "DeviceId": "HID\\VID_1&PID_1\\0000",
            "InstanceId": "0000",
            "ProcessId": pid,
        })
        .to_string()
    }

    fn confirmation(id: RequestId, code: i64) -> String {
        json!({
            "Header": { "Id": id.to_string(), "Kind": "Confirmation" },
            "Code": code,
            "Message": "done",
        })
        .to_string()
    }

    #[test]
    fn test_whitelisted_request_allowed() {
        let handler = handler(&["VID_1_PID_1"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();

        handler.handle_frame(&access_request(id, LOCAL_PID, &["VID_1_PID_1"]), &sink);

        assert_eq!(
            sink.decisions(),
            vec![json!({
                "Header": { "Id": id.to_string() },
                "IsAllowed": true,
                "IsPermanent": true,
            })]
        );
        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Processing));
    }

    #[test]
    fn test_unlisted_request_denied() {
        let handler = handler(&["AB"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();

        handler.handle_frame(&access_request(id, LOCAL_PID, &["CD"]), &sink);

        let decisions = sink.decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0]["IsAllowed"], json!(false));
        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Processing));
    }

    #[test]
    fn test_whitelist_applies_to_later_requests() {
        let handler = handler(&[]);
        let sink = RecordingSink::default();
        let before = RequestId::new_v4();
        let after = RequestId::new_v4();
        let denied = RequestId::new_v4();

        handler.handle_frame(&access_request(before, LOCAL_PID, &["AB", "CD"]), &sink);
        handler.whitelist().extend(["AB"]);
        handler.handle_frame(&access_request(after, LOCAL_PID, &["AB", "CD"]), &sink);
        handler.handle_frame(&access_request(denied, LOCAL_PID, &["CD"]), &sink);

        let allowed: Vec<_> = sink
            .decisions()
            .iter()
            .map(|d| d["IsAllowed"].as_bool().unwrap())
            .collect();
        assert_eq!(allowed, vec![false, true, false]);
    }

    #[test]
    fn test_foreign_process_never_answered() {
        let handler = handler(&["VID_1_PID_1"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();

        handler.handle_frame(&access_request(id, 4321, &["VID_1_PID_1"]), &sink);

        assert!(sink.decisions().is_empty());
        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Received));
    }

    #[test]
    fn test_duplicate_request_single_decision() {
        let handler = handler(&["VID_1_PID_1"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();
        let frame = access_request(id, LOCAL_PID, &["VID_1_PID_1"]);

        handler.handle_frame(&frame, &sink);
        handler.handle_frame(&frame, &sink);

        assert_eq!(sink.decisions().len(), 1);
        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Processing));
    }

    #[test]
    fn test_malformed_frames_ignored() {
        let handler = handler(&["AB"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();

        let frames = [
            "not json".to_string(),
            "[]".to_string(),
            json!({ "HardwareIds": ["AB"], "ProcessId": LOCAL_PID }).to_string(),
            json!({ "Header": { "Id": id.to_string(), "Kind": "Telemetry" } }).to_string(),
            json!({
                "Header": { "Id": id.to_string(), "Kind": "AccessRequest" },
                "HardwareIds": ["AB"],
            })
            .to_string(),
        ];
        for frame in &frames {
            handler.handle_frame(frame, &sink);
        }

        assert!(sink.decisions().is_empty());
        assert!(handler.correlator().is_empty());
    }

    #[test]
    fn test_confirmation_for_untracked_id() {
        let handler = handler(&[]);
        let sink = RecordingSink::default();
        let ok = RequestId::new_v4();
        let failed = RequestId::new_v4();

        handler.handle_frame(&confirmation(ok, 200), &sink);
        handler.handle_frame(&confirmation(failed, 500), &sink);

        assert_eq!(handler.correlator().status(&ok), Some(RequestStatus::Processed));
        assert_eq!(handler.correlator().status(&failed), Some(RequestStatus::Error));
        assert!(sink.decisions().is_empty());
    }

    #[test]
    fn test_confirmation_for_tracked_id_untouched_by_default() {
        let handler = handler(&["AB"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();

        handler.handle_frame(&access_request(id, LOCAL_PID, &["AB"]), &sink);
        handler.handle_frame(&confirmation(id, 200), &sink);

        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Processing));
    }

    #[test]
    fn test_confirmation_tracked_mode() {
        let handler = handler(&["AB"]).with_confirmation_mode(ConfirmationMode::Tracked);
        let sink = RecordingSink::default();
        let ok = RequestId::new_v4();
        let failed = RequestId::new_v4();

        handler.handle_frame(&access_request(ok, LOCAL_PID, &["AB"]), &sink);
        handler.handle_frame(&access_request(failed, LOCAL_PID, &["AB"]), &sink);
        handler.handle_frame(&confirmation(ok, 200), &sink);
        handler.handle_frame(&confirmation(failed, 403), &sink);

        assert_eq!(handler.correlator().status(&ok), Some(RequestStatus::Processed));
        assert_eq!(handler.correlator().status(&failed), Some(RequestStatus::Error));
    }

    #[test]
    fn test_confirmation_with_empty_id_ignored() {
        let handler = handler(&[]);
        let sink = RecordingSink::default();

        handler.handle_frame(&confirmation(RequestId::NIL, 200), &sink);

        assert!(handler.correlator().is_empty());
    }

    #[test]
    fn test_confirmation_before_request_suppresses_decision() {
        let handler = handler(&["AB"]);
        let sink = RecordingSink::default();
        let id = RequestId::new_v4();

        handler.handle_frame(&confirmation(id, 200), &sink);
        handler.handle_frame(&access_request(id, LOCAL_PID, &["AB"]), &sink);

        assert!(sink.decisions().is_empty());
        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Processed));
    }

    #[test]
    fn test_send_failure_leaves_decided_status() {
        let handler = handler(&["AB"]);
        let sink = RecordingSink {
            closed: true,
            ..Default::default()
        };
        let id = RequestId::new_v4();

        handler.handle_frame(&access_request(id, LOCAL_PID, &["AB"]), &sink);

        assert_eq!(handler.correlator().status(&id), Some(RequestStatus::Accepted));
    }

    #[test]
    fn test_non_permanent_decisions() {
        let handler = handler(&["AB"]).with_permanent(false);
        let sink = RecordingSink::default();

        handler.handle_frame(&access_request(RequestId::new_v4(), LOCAL_PID, &["AB"]), &sink);

        assert_eq!(sink.decisions()[0]["IsPermanent"], json!(false));
    }
}
