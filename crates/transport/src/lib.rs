//! HidGuard Transport - WebSocket text layer
//!
//! This crate provides:
//! - WebSocket client for the gatekeeper endpoint
//! - A spawned connection that feeds every inbound text frame to a
//!   [`FrameHandler`] and drains outbound frames through a writer task

mod connection;
mod ws_client;

pub use connection::*;
pub use ws_client::*;

/// Outbound half handed to frame handlers
pub trait MessageSink: Send + Sync {
    /// Queue a text frame; never blocks
    fn send_text(&self, text: String) -> Result<(), SendError>;
}

/// Receives inbound text frames, one at a time and in delivery order
pub trait FrameHandler: Send + Sync {
    fn on_text(&self, text: &str, sink: &dyn MessageSink);
}
