//! Spawned gatekeeper connection
//!
//! The reader task hands each text frame to a [`FrameHandler`] and waits for
//! it to return before reading the next one. Outbound frames go through an
//! unbounded channel drained by the writer task, so handlers never await.

use crate::ws_client::{WsClient, WsStream};
use crate::{FrameHandler, MessageSink};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

type WsTx = SplitSink<WsStream, Message>;
type WsRx = SplitStream<WsStream>;

/// Upper bound on flushing the close frame during shutdown
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SendError {
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Cloneable outbound handle feeding the writer task
#[derive(Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<Message>,
    // Set by either side; outbound frames are refused afterwards
    closed: Arc<AtomicBool>,
}

impl MessageSink for OutboundSender {
    fn send_text(&self, text: String) -> Result<(), SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::ConnectionClosed);
        }
        self.tx
            .send(Message::Text(text.into()))
            .map_err(|_| SendError::ConnectionClosed)
    }
}

/// A live connection with its reader and writer tasks
pub struct Connection {
    outbound: OutboundSender,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    disconnected: watch::Receiver<bool>,
    // Owner-side disposal, independent of the server going away
    disposed: AtomicBool,
    url: String,
}

impl Connection {
    /// Split the client and start serving inbound frames with `handler`
    pub fn spawn(client: WsClient, handler: Arc<dyn FrameHandler>) -> Self {
        let url = client.url().to_string();
        let (ws_tx, ws_rx) = client.into_stream().split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (disconnected_tx, disconnected) = watch::channel(false);

        let outbound = OutboundSender {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        };

        let writer = tokio::spawn(write_loop(ws_tx, rx));
        let reader = tokio::spawn(read_loop(
            ws_rx,
            handler,
            outbound.clone(),
            disconnected_tx,
        ));

        Self {
            outbound,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            disconnected,
            disposed: AtomicBool::new(false),
            url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True once the owner closed the connection or the server went away
    pub fn is_closed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.outbound.closed.load(Ordering::Acquire)
    }

    /// Dispose of the connection; returns false if the owner already did.
    ///
    /// The first call always wakes the writer, even when the server has
    /// already gone away.
    pub fn close(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.outbound.closed.store(true, Ordering::Release);

        info!("Closing connection to {}", self.url);

        // Writer sends the close frame and exits; fails only if it is already gone
        let _ = self.outbound.tx.send(Message::Close(None));
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        true
    }

    /// Close and wait (bounded) for the close frame to be flushed
    pub async fn shutdown(&self) {
        self.close();
        let writer = self.writer.lock().take();
        if let Some(mut writer) = writer {
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer)
                .await
                .is_err()
            {
                warn!("Close frame not flushed within {:?}", CLOSE_FLUSH_TIMEOUT);
                writer.abort();
            }
        }
    }

    /// Resolves once the server side has gone away
    pub async fn disconnected(&self) {
        let mut rx = self.disconnected.clone();
        let _ = rx.wait_for(|gone| *gone).await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_loop(mut ws_tx: WsTx, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if let Err(e) = ws_tx.send(msg).await {
            warn!("Send failed: {}", e);
            break;
        }
        if is_close {
            break;
        }
    }
    let _ = ws_tx.close().await;
    debug!("Writer task finished");
}

async fn read_loop(
    mut ws_rx: WsRx,
    handler: Arc<dyn FrameHandler>,
    outbound: OutboundSender,
    disconnected: watch::Sender<bool>,
) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => handler.on_text(text.as_str(), &outbound),
            Ok(Message::Close(frame)) => {
                debug!("Server closed connection: {:?}", frame);
                break;
            }
            Ok(other) => trace!("Ignoring non-text frame: {:?}", other),
            Err(e) => {
                warn!("Receive failed: {}", e);
                break;
            }
        }
    }

    outbound.closed.store(true, Ordering::Release);
    let _ = disconnected.send(true);
    info!("Connection to gatekeeper ended");
}
