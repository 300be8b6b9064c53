//! Client configuration and connection state.

use std::sync::Arc;
use std::time::Duration;

use tmrpc_core::address::DEFAULT_WS_ENDPOINT;
use tmrpc_core::backoff::BackoffConfig;

/// Invoked each time a dropped connection has been re-established.
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Configuration for the WebSocket client.
#[derive(Clone)]
pub struct WsClientConfig {
    /// Path appended to addresses that carry none.
    pub endpoint: String,
    /// Redials attempted after a connection drops before the client gives up.
    pub max_reconnect_attempts: u32,
    pub backoff: BackoffConfig,
    /// Send a ping this often. `None` disables pings.
    pub ping_period: Option<Duration>,
    /// A connection that stays silent this long is considered dead.
    pub read_wait: Option<Duration>,
    /// Deadline for writing a single frame.
    pub write_wait: Option<Duration>,
    /// Frames that may wait for the write loop before `send` blocks.
    pub queue_capacity: usize,
    pub on_reconnect: Option<ReconnectCallback>,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            max_reconnect_attempts: 25,
            backoff: BackoffConfig::default(),
            ping_period: None,
            read_wait: None,
            write_wait: None,
            queue_capacity: 64,
            on_reconnect: None,
        }
    }
}

impl WsClientConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_ping_period(mut self, period: Duration) -> Self {
        self.ping_period = Some(period);
        self
    }

    pub fn with_read_wait(mut self, wait: Duration) -> Self {
        self.read_wait = Some(wait);
        self
    }

    pub fn with_write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = Some(wait);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn on_reconnect(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for WsClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClientConfig")
            .field("endpoint", &self.endpoint)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("backoff", &self.backoff)
            .field("ping_period", &self.ping_period)
            .field("read_wait", &self.read_wait)
            .field("write_wait", &self.write_wait)
            .field("queue_capacity", &self.queue_capacity)
            .field("on_reconnect", &self.on_reconnect.is_some())
            .finish()
    }
}

/// Lifecycle of a client connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
