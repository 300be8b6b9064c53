//! WebSocket JSON-RPC client with automatic reconnect.
//!
//! Requests are registered in the correlation table, queued as one frame
//! each, and written by the background write loop. A frame whose write fails
//! is kept and replayed first on the next connection, so a dropped socket
//! costs a caller latency, not its request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use tmrpc_core::address::ws_url;
use tmrpc_core::error::TransportError;
use tmrpc_core::id::{CorrelationKey, IdGenerator};
use tmrpc_core::request::{JsonRpcRequest, JsonRpcResponse, RpcParams};
use tmrpc_core::transport::{HealthStatus, RpcTransport};

use crate::config::{ConnectionState, WsClientConfig};
use crate::connector::{Connector, TungsteniteConnector};
use crate::pending::{Frame, PendingResponse, Table};
use crate::supervisor::Supervisor;

/// WebSocket JSON-RPC client.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct WsRpcClient {
    url: String,
    ids: IdGenerator,
    table: Table,
    queue: mpsc::Sender<Frame>,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WsRpcClient {
    /// Dial `remote` and start the background loops.
    ///
    /// `remote` may be a `ws(s)://` or `http(s)://` URL, a `tcp://` address or
    /// a bare `host:port`. The first dial is not retried.
    pub async fn connect(remote: &str, config: WsClientConfig) -> Result<Self, TransportError> {
        Self::connect_with(remote, config, Arc::new(TungsteniteConnector)).await
    }

    /// Like [`WsRpcClient::connect`], dialing through `connector`.
    pub async fn connect_with(
        remote: &str,
        config: WsClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, TransportError> {
        let url = ws_url(remote, &config.endpoint)?;
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        tracing::info!(url = %url, "connecting via WebSocket");
        let (sink, stream) = connector.connect(&url).await?;
        state_tx.send_replace(ConnectionState::Connected);
        tracing::info!(url = %url, "WS connected");

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let table = Table::new();

        let supervisor = Supervisor {
            url: url.clone(),
            connector,
            table: table.clone(),
            config,
            state: state_tx,
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(supervisor.run(sink, stream, queue_rx));

        Ok(Self {
            url,
            ids: IdGenerator::new("ws-client"),
            table,
            queue: queue_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            supervisor: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    /// Queue `requests` as one frame and return a handle to its response.
    ///
    /// Waits only until the frame is queued. A single request is written as
    /// an object, several as a batch array.
    pub async fn send(
        &self,
        requests: Vec<JsonRpcRequest>,
    ) -> Result<PendingResponse, TransportError> {
        let payload = match requests.as_slice() {
            [] => return Err(TransportError::EmptyBatch),
            [single] => serde_json::to_string(single),
            many => serde_json::to_string(many),
        }
        .map_err(|e| TransportError::Encode(e.to_string()))?;

        let key = CorrelationKey::for_requests(&requests);
        let rx = self.table.register(key.clone())?;
        // dropping `pending` on the error path unregisters the key
        let pending = PendingResponse::new(key.clone(), rx, self.table.clone());
        self.queue
            .send(Frame { key, payload })
            .await
            .map_err(|_| TransportError::ClientClosed)?;
        Ok(pending)
    }

    async fn round_trip(
        &self,
        requests: Vec<JsonRpcRequest>,
        timeout: Option<Duration>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let exchange = async { self.send(requests).await?.recv().await };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange).await.unwrap_or(Err(
                TransportError::Timeout {
                    ms: timeout.as_millis() as u64,
                },
            )),
            None => exchange.await,
        }
    }

    /// Call `method` and decode its result into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: RpcParams,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let req = JsonRpcRequest::new(self.ids.next_id(), method, params);
        let mut responses = self.round_trip(vec![req], Some(timeout)).await?;
        responses
            .pop()
            .ok_or_else(|| TransportError::Protocol("empty response".into()))?
            .decode_into()
    }

    /// Send `requests` as one batch; responses come back in server order.
    pub async fn call_batch(
        &self,
        requests: Vec<JsonRpcRequest>,
        timeout: Duration,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        self.round_trip(requests, Some(timeout)).await
    }

    /// Stop the loops, wait for them, and fail every pending call with
    /// [`TransportError::ClientClosed`]. Safe to call more than once.
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut supervisor = self.supervisor.lock().await;
        self.shutdown.send_replace(true);
        if let Some(handle) = supervisor.take() {
            if let Err(e) = handle.await {
                tracing::error!(url = %self.url, error = %e, "WS supervisor died");
            }
        }
        self.table.close();
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_reconnecting(&self) -> bool {
        self.state() == ConnectionState::Reconnecting
    }

    /// Time since the last pong, if any arrived.
    pub fn since_last_pong(&self) -> Option<Duration> {
        self.table.since_last_pong()
    }

    /// Calls registered and not yet answered.
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send_request(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.round_trip(vec![req], None)
            .await?
            .pop()
            .ok_or_else(|| TransportError::Protocol("empty response".into()))
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        self.round_trip(reqs, None).await
    }

    fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    fn health(&self) -> HealthStatus {
        match self.state() {
            ConnectionState::Connected => HealthStatus::Healthy,
            ConnectionState::Connecting | ConnectionState::Reconnecting => HealthStatus::Degraded,
            ConnectionState::Closed => HealthStatus::Unhealthy,
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&self) -> Result<(), TransportError> {
        WsRpcClient::close(self).await
    }
}
