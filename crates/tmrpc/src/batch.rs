//! Batches of named operations, sent as one JSON-RPC batch.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use tmrpc_core::batch::{Batch, BatchResults, BatchSlot};
use tmrpc_core::error::TransportError;
use tmrpc_core::request::RpcParams;
use tmrpc_core::transport::RpcTransport;

use crate::methods::{self, AbciQueryOptions, MethodCall};

/// A batch created by [`crate::RpcClient::new_batch`].
///
/// Each named operation queues a request and returns the slot its result
/// will be taken from after [`RpcBatch::send`].
pub struct RpcBatch {
    batch: Batch,
    timeout: Duration,
}

impl RpcBatch {
    pub(crate) fn new(transport: Arc<dyn RpcTransport>, timeout: Duration) -> Self {
        Self {
            batch: Batch::new(transport),
            timeout,
        }
    }

    /// Queue any method by name.
    pub fn call<T>(&mut self, method: &str, params: RpcParams) -> BatchSlot<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.batch.add_request(method, params)
    }

    fn push<T>(&mut self, call: MethodCall) -> BatchSlot<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.batch.add_request(call.method, call.params)
    }

    pub fn count(&self) -> usize {
        self.batch.count()
    }

    pub fn clear(&mut self) -> usize {
        self.batch.clear()
    }

    /// Send everything queued so far. The batch is empty afterwards.
    pub async fn send(&mut self) -> Result<BatchResults, TransportError> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.batch.send())
            .await
            .unwrap_or(Err(TransportError::Timeout {
                ms: timeout.as_millis() as u64,
            }))
    }

    pub fn status<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::status())
    }

    pub fn abci_info<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::abci_info())
    }

    pub fn abci_query<T: DeserializeOwned + Send + 'static>(
        &mut self,
        path: &str,
        data: &[u8],
    ) -> BatchSlot<T> {
        self.abci_query_with_options(path, data, AbciQueryOptions::default())
    }

    pub fn abci_query_with_options<T: DeserializeOwned + Send + 'static>(
        &mut self,
        path: &str,
        data: &[u8],
        opts: AbciQueryOptions,
    ) -> BatchSlot<T> {
        self.push(methods::abci_query(path, data, opts))
    }

    pub fn broadcast_tx_commit<T: DeserializeOwned + Send + 'static>(
        &mut self,
        tx: &[u8],
    ) -> BatchSlot<T> {
        self.push(methods::broadcast_tx(methods::BROADCAST_TX_COMMIT, tx))
    }

    pub fn broadcast_tx_sync<T: DeserializeOwned + Send + 'static>(
        &mut self,
        tx: &[u8],
    ) -> BatchSlot<T> {
        self.push(methods::broadcast_tx(methods::BROADCAST_TX_SYNC, tx))
    }

    pub fn broadcast_tx_async<T: DeserializeOwned + Send + 'static>(
        &mut self,
        tx: &[u8],
    ) -> BatchSlot<T> {
        self.push(methods::broadcast_tx(methods::BROADCAST_TX_ASYNC, tx))
    }

    pub fn unconfirmed_txs<T: DeserializeOwned + Send + 'static>(
        &mut self,
        limit: i64,
    ) -> BatchSlot<T> {
        self.push(methods::unconfirmed_txs(limit))
    }

    pub fn num_unconfirmed_txs<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::num_unconfirmed_txs())
    }

    pub fn net_info<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::net_info())
    }

    pub fn dump_consensus_state<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::dump_consensus_state())
    }

    pub fn consensus_state<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::consensus_state())
    }

    pub fn consensus_params<T: DeserializeOwned + Send + 'static>(
        &mut self,
        height: Option<i64>,
    ) -> BatchSlot<T> {
        self.push(methods::consensus_params(height))
    }

    pub fn health<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::health())
    }

    pub fn blockchain_info<T: DeserializeOwned + Send + 'static>(
        &mut self,
        min_height: i64,
        max_height: i64,
    ) -> BatchSlot<T> {
        self.push(methods::blockchain_info(min_height, max_height))
    }

    pub fn genesis<T: DeserializeOwned + Send + 'static>(&mut self) -> BatchSlot<T> {
        self.push(methods::genesis())
    }

    pub fn block<T: DeserializeOwned + Send + 'static>(
        &mut self,
        height: Option<i64>,
    ) -> BatchSlot<T> {
        self.push(methods::block(height))
    }

    pub fn block_results<T: DeserializeOwned + Send + 'static>(
        &mut self,
        height: Option<i64>,
    ) -> BatchSlot<T> {
        self.push(methods::block_results(height))
    }

    pub fn commit<T: DeserializeOwned + Send + 'static>(
        &mut self,
        height: Option<i64>,
    ) -> BatchSlot<T> {
        self.push(methods::commit(height))
    }

    pub fn tx<T: DeserializeOwned + Send + 'static>(&mut self, hash: &[u8]) -> BatchSlot<T> {
        self.push(methods::tx(hash))
    }

    pub fn validators<T: DeserializeOwned + Send + 'static>(
        &mut self,
        height: Option<i64>,
    ) -> BatchSlot<T> {
        self.push(methods::validators(height))
    }
}

impl std::fmt::Debug for RpcBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcBatch")
            .field("count", &self.batch.count())
            .field("timeout", &self.timeout)
            .finish()
    }
}
