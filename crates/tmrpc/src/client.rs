//! The node client: named RPC operations over any transport.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use tmrpc_core::error::TransportError;
use tmrpc_core::request::{JsonRpcRequest, RpcParams};
use tmrpc_core::transport::{HealthStatus, RpcTransport};
use tmrpc_http::{HttpClientConfig, HttpRpcClient};
use tmrpc_ws::{WsClientConfig, WsRpcClient};

use crate::batch::RpcBatch;
use crate::methods::{self, AbciQueryOptions, MethodCall};

/// Per-call deadline unless overridden with [`RpcClient::with_request_timeout`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a Tendermint2 node.
///
/// Every named operation is generic over its result type: pass the struct
/// you expect back, or `serde_json::Value` to inspect the raw result.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), tmrpc_core::TransportError> {
/// let client = tmrpc::RpcClient::http("tcp://127.0.0.1:26657")?;
/// let status: serde_json::Value = client.status().await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    request_timeout: Duration,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Client over the stateless HTTP transport.
    pub fn http(remote: &str) -> Result<Self, TransportError> {
        Self::http_with(remote, HttpClientConfig::default())
    }

    pub fn http_with(remote: &str, config: HttpClientConfig) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(HttpRpcClient::new(remote, config)?)))
    }

    /// Client over a persistent WebSocket connection.
    pub async fn ws(remote: &str) -> Result<Self, TransportError> {
        Self::ws_with(remote, WsClientConfig::default()).await
    }

    pub async fn ws_with(remote: &str, config: WsClientConfig) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(WsRpcClient::connect(remote, config).await?)))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    /// Health of the underlying transport (not the node's `health` RPC).
    pub fn transport_health(&self) -> HealthStatus {
        self.transport.health()
    }

    /// Call any method by name and decode its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: RpcParams,
    ) -> Result<T, TransportError> {
        let req = JsonRpcRequest::new(self.transport.ids().next_id(), method, params);
        tracing::debug!(url = %self.transport.url(), request = %req, "calling");

        let resp = tokio::time::timeout(self.request_timeout, self.transport.send_request(req))
            .await
            .map_err(|_| TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            })??;
        resp.decode_into()
    }

    async fn invoke<T: DeserializeOwned>(&self, call: MethodCall) -> Result<T, TransportError> {
        self.call(call.method, call.params).await
    }

    /// Start an empty batch on the same transport.
    pub fn new_batch(&self) -> RpcBatch {
        RpcBatch::new(self.transport.clone(), self.request_timeout)
    }

    /// Release the transport. WebSocket clients stop their loops and fail
    /// pending calls; HTTP clients have nothing to release.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.transport.close().await
    }

    pub async fn status<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::status()).await
    }

    pub async fn abci_info<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::abci_info()).await
    }

    /// `abci_query` at the latest height, without proof.
    pub async fn abci_query<T: DeserializeOwned>(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<T, TransportError> {
        self.abci_query_with_options(path, data, AbciQueryOptions::default())
            .await
    }

    pub async fn abci_query_with_options<T: DeserializeOwned>(
        &self,
        path: &str,
        data: &[u8],
        opts: AbciQueryOptions,
    ) -> Result<T, TransportError> {
        self.invoke(methods::abci_query(path, data, opts)).await
    }

    /// Submit `tx` and wait until it is committed in a block.
    pub async fn broadcast_tx_commit<T: DeserializeOwned>(
        &self,
        tx: &[u8],
    ) -> Result<T, TransportError> {
        self.invoke(methods::broadcast_tx(methods::BROADCAST_TX_COMMIT, tx))
            .await
    }

    /// Submit `tx` and wait for the mempool check.
    pub async fn broadcast_tx_sync<T: DeserializeOwned>(
        &self,
        tx: &[u8],
    ) -> Result<T, TransportError> {
        self.invoke(methods::broadcast_tx(methods::BROADCAST_TX_SYNC, tx))
            .await
    }

    /// Submit `tx` without waiting for anything.
    pub async fn broadcast_tx_async<T: DeserializeOwned>(
        &self,
        tx: &[u8],
    ) -> Result<T, TransportError> {
        self.invoke(methods::broadcast_tx(methods::BROADCAST_TX_ASYNC, tx))
            .await
    }

    pub async fn unconfirmed_txs<T: DeserializeOwned>(
        &self,
        limit: i64,
    ) -> Result<T, TransportError> {
        self.invoke(methods::unconfirmed_txs(limit)).await
    }

    pub async fn num_unconfirmed_txs<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::num_unconfirmed_txs()).await
    }

    pub async fn net_info<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::net_info()).await
    }

    pub async fn dump_consensus_state<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::dump_consensus_state()).await
    }

    pub async fn consensus_state<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::consensus_state()).await
    }

    pub async fn consensus_params<T: DeserializeOwned>(
        &self,
        height: Option<i64>,
    ) -> Result<T, TransportError> {
        self.invoke(methods::consensus_params(height)).await
    }

    /// The node's `health` RPC.
    pub async fn health<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::health()).await
    }

    /// Block metadata for heights `min_height..=max_height`.
    pub async fn blockchain_info<T: DeserializeOwned>(
        &self,
        min_height: i64,
        max_height: i64,
    ) -> Result<T, TransportError> {
        self.invoke(methods::blockchain_info(min_height, max_height))
            .await
    }

    pub async fn genesis<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.invoke(methods::genesis()).await
    }

    pub async fn block<T: DeserializeOwned>(
        &self,
        height: Option<i64>,
    ) -> Result<T, TransportError> {
        self.invoke(methods::block(height)).await
    }

    pub async fn block_results<T: DeserializeOwned>(
        &self,
        height: Option<i64>,
    ) -> Result<T, TransportError> {
        self.invoke(methods::block_results(height)).await
    }

    pub async fn commit<T: DeserializeOwned>(
        &self,
        height: Option<i64>,
    ) -> Result<T, TransportError> {
        self.invoke(methods::commit(height)).await
    }

    pub async fn tx<T: DeserializeOwned>(&self, hash: &[u8]) -> Result<T, TransportError> {
        self.invoke(methods::tx(hash)).await
    }

    pub async fn validators<T: DeserializeOwned>(
        &self,
        height: Option<i64>,
    ) -> Result<T, TransportError> {
        self.invoke(methods::validators(height)).await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.transport.url())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
