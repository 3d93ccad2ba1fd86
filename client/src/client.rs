//! HidGuard client facade
//!
//! Owns the whitelist, the correlator and the gatekeeper connection. The
//! connection is released on `close`, on `shutdown` and when the client is
//! dropped, whichever comes first.

use crate::config::ClientConfig;
use crate::correlator::{ConfirmationMode, Correlator, RequestStatus, StatusSummary};
use crate::handler::RequestHandler;
use crate::whitelist::Whitelist;
use hidguard_protocol::RequestId;
use hidguard_transport::{Connection, DEFAULT_ENDPOINT, WsClient, WsClientConfig, WsClientError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] WsClientError),
}

/// Options for [`HidGuardClient::connect`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Process whose requests this client decides
    pub process_id: u32,

    /// Gatekeeper WebSocket endpoint
    pub endpoint: String,

    pub connect_timeout: Duration,

    /// Initial whitelist
    pub hardware_ids: Vec<String>,

    /// `IsPermanent` on sent decisions
    pub permanent: bool,

    pub confirmation: ConfirmationMode,

    /// Evict finished requests older than this; `None` keeps them forever
    pub retention: Option<Duration>,

    pub sweep_interval: Duration,
}

impl ClientOptions {
    pub fn new(process_id: u32) -> Self {
        Self {
            process_id,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            hardware_ids: Vec::new(),
            permanent: true,
            confirmation: ConfirmationMode::default(),
            retention: None,
            sweep_interval: Duration::from_secs(60),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn whitelist<I, S>(mut self, hardware_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hardware_ids
            .extend(hardware_ids.into_iter().map(Into::into));
        self
    }

    pub fn confirmation(mut self, mode: ConfirmationMode) -> Self {
        self.confirmation = mode;
        self
    }

    pub fn retention(mut self, max_age: Duration, sweep_interval: Duration) -> Self {
        self.retention = Some(max_age);
        self.sweep_interval = sweep_interval;
        self
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            process_id: config.client.process_id(),
            endpoint: config.server.endpoint.clone(),
            connect_timeout: Duration::from_secs(config.server.connect_timeout),
            hardware_ids: config.client.hardware_ids.clone(),
            permanent: config.client.permanent,
            confirmation: config.correlator.confirmation,
            retention: config.correlator.retention(),
            sweep_interval: Duration::from_secs(config.correlator.sweep_interval_secs.max(1)),
        }
    }
}

/// Client side of the HidGuard arbitration protocol
pub struct HidGuardClient {
    handler: Arc<RequestHandler>,
    connection: Connection,
    sweeper: Option<JoinHandle<()>>,
}

impl HidGuardClient {
    /// Connect to the gatekeeper and start answering access requests
    pub async fn connect(options: ClientOptions) -> Result<Self, ClientError> {
        let whitelist = Arc::new(Whitelist::from_iter(options.hardware_ids));
        let correlator = Arc::new(Correlator::new());
        let handler = Arc::new(
            RequestHandler::new(options.process_id, whitelist, correlator.clone())
                .with_permanent(options.permanent)
                .with_confirmation_mode(options.confirmation),
        );

        let ws = WsClient::connect(WsClientConfig {
            url: options.endpoint,
            connect_timeout: options.connect_timeout,
            ..Default::default()
        })
        .await?;
        let connection = Connection::spawn(ws, handler.clone());

        let sweeper = options
            .retention
            .map(|max_age| spawn_sweeper(correlator, max_age, options.sweep_interval));

        info!(
            "HidGuard client ready for pid {} at {}",
            options.process_id,
            connection.url()
        );

        Ok(Self {
            handler,
            connection,
            sweeper,
        })
    }

    /// Connect with default options
    pub async fn connect_with(process_id: u32, endpoint: Option<&str>) -> Result<Self, ClientError> {
        let mut options = ClientOptions::new(process_id);
        if let Some(endpoint) = endpoint {
            options = options.endpoint(endpoint);
        }
        Self::connect(options).await
    }

    pub fn process_id(&self) -> u32 {
        self.handler.process_id()
    }

    /// Approve `hardware_ids` for subsequent requests of our process
    pub fn whitelist_devices<I, S>(&self, hardware_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handler.whitelist().extend(hardware_ids);
    }

    /// Lifecycle status of a request, `None` if never seen
    pub fn status(&self, id: &RequestId) -> Option<RequestStatus> {
        self.handler.correlator().status(id)
    }

    pub fn summary(&self) -> StatusSummary {
        self.handler.correlator().summary()
    }

    pub fn correlator(&self) -> &Correlator {
        self.handler.correlator()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Close the connection; later calls are no-ops
    pub fn close(&self) -> bool {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
        self.connection.close()
    }

    /// Close and wait until the close frame is flushed
    pub async fn shutdown(&self) {
        self.close();
        self.connection.shutdown().await;
    }

    /// Resolves once the gatekeeper drops the connection
    pub async fn disconnected(&self) {
        self.connection.disconnected().await;
    }
}

impl Drop for HidGuardClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_sweeper(correlator: Arc<Correlator>, max_age: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let evicted = correlator.evict_expired(max_age);
            if evicted > 0 {
                debug!("Evicted {} finished request(s)", evicted);
            }
        }
    })
}
