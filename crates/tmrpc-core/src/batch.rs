//! Client-side request batching.
//!
//! A [`Batch`] collects requests, each with its own expected result type,
//! and sends them as one unit through any [`RpcTransport`]. Every `add_*`
//! call hands back a typed [`BatchSlot`]; after [`Batch::send`] the slot
//! pulls that entry's decoded value out of the [`BatchResults`].
//!
//! # Usage
//! ```rust,no_run
//! # async fn demo(transport: std::sync::Arc<dyn tmrpc_core::RpcTransport>) -> Result<(), tmrpc_core::TransportError> {
//! use tmrpc_core::{Batch, RpcParams};
//!
//! let mut batch = Batch::new(transport);
//! let height = batch.add_request::<u64>("latest_height", RpcParams::new());
//! let peers = batch.add_request::<Vec<String>>("peers", RpcParams::new());
//!
//! let mut results = batch.send().await?;
//! let height = results.take(&height)?;
//! let peers = results.take(&peers)?;
//! # Ok(()) }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BatchEntryError, BatchError, TransportError};
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId, RpcParams};
use crate::transport::RpcTransport;

type Decoded = Box<dyn Any + Send>;
type Decoder = Box<dyn FnOnce(JsonRpcResponse) -> Result<Decoded, TransportError> + Send>;

struct BatchEntry {
    request: JsonRpcRequest,
    decode: Decoder,
}

/// Typed handle to one entry of a batch.
pub struct BatchSlot<T> {
    index: usize,
    id: RpcId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BatchSlot<T> {
    /// Position of the entry in request order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &RpcId {
        &self.id
    }
}

impl<T> Clone for BatchSlot<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for BatchSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSlot")
            .field("index", &self.index)
            .field("id", &self.id)
            .finish()
    }
}

/// An ordered queue of requests sent as a single batch.
pub struct Batch {
    transport: Arc<dyn RpcTransport>,
    entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            entries: Vec::new(),
        }
    }

    /// Queue `method` with already-encoded params.
    pub fn add_request<T>(&mut self, method: impl Into<String>, params: RpcParams) -> BatchSlot<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let id = self.transport.ids().next_id();
        self.enqueue(JsonRpcRequest::new(id, method, params))
    }

    /// Queue `method`, encoding `params` first. Fails only if encoding fails.
    pub fn add<T, P>(
        &mut self,
        method: impl Into<String>,
        params: &P,
    ) -> Result<BatchSlot<T>, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
        P: Serialize + ?Sized,
    {
        let params = RpcParams::from_serialize(params)?;
        Ok(self.add_request(method, params))
    }

    /// Queue a fully built request, keeping its id. Responses are matched
    /// by id, so an id already in the queue is rejected.
    pub fn push<T>(&mut self, request: JsonRpcRequest) -> Result<BatchSlot<T>, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.entries.iter().any(|e| e.request.id == request.id) {
            return Err(TransportError::Protocol(format!(
                "request id {} is already queued in this batch",
                request.id
            )));
        }
        Ok(self.enqueue(request))
    }

    fn enqueue<T>(&mut self, request: JsonRpcRequest) -> BatchSlot<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let slot = BatchSlot {
            index: self.entries.len(),
            id: request.id.clone(),
            _marker: PhantomData,
        };
        let decode: Decoder =
            Box::new(|response: JsonRpcResponse| response.decode_into::<T>().map(|v| Box::new(v) as Decoded));
        self.entries.push(BatchEntry { request, decode });
        slot
    }

    /// Number of queued requests.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Drop every queued request, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn requests(&self) -> impl Iterator<Item = &JsonRpcRequest> {
        self.entries.iter().map(|e| &e.request)
    }

    /// Send every queued request as one batch and decode the responses.
    ///
    /// The queue is emptied whatever the outcome. Responses are matched to
    /// entries by id; a response whose id matches no entry aborts the whole
    /// send. Per-entry failures stay inside the returned [`BatchResults`].
    pub async fn send(&mut self) -> Result<BatchResults, TransportError> {
        if self.entries.is_empty() {
            return Err(TransportError::EmptyBatch);
        }
        let entries = std::mem::take(&mut self.entries);
        let (requests, decoders): (Vec<_>, Vec<_>) =
            entries.into_iter().map(|e| (e.request, e.decode)).unzip();

        let ids: Vec<RpcId> = requests.iter().map(|r| r.id.clone()).collect();
        let positions: HashMap<&RpcId, usize> =
            ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

        tracing::debug!(count = requests.len(), url = %self.transport.url(), "sending batch");
        let responses = self.transport.send_batch(requests).await?;

        let mut matched: Vec<Option<JsonRpcResponse>> = (0..ids.len()).map(|_| None).collect();
        for response in responses {
            let Some(&index) = positions.get(&response.id) else {
                return Err(TransportError::Protocol(format!(
                    "response id {} matches no request in the batch",
                    response.id
                )));
            };
            if matched[index].is_some() {
                return Err(TransportError::Protocol(format!(
                    "duplicate response for id {}",
                    response.id
                )));
            }
            matched[index] = Some(response);
        }

        let outcomes = decoders
            .into_iter()
            .zip(matched)
            .zip(&ids)
            .map(|((decode, response), id)| {
                Some(match response {
                    Some(response) => decode(response),
                    None => Err(TransportError::Protocol(format!("no response for id {id}"))),
                })
            })
            .collect();

        Ok(BatchResults { ids, outcomes })
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("url", &self.transport.url())
            .field("count", &self.entries.len())
            .finish()
    }
}

/// Decoded outcomes of one batch, in request order.
pub struct BatchResults {
    ids: Vec<RpcId>,
    outcomes: Vec<Option<Result<Decoded, TransportError>>>,
}

impl BatchResults {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Move the outcome of `slot` out of the results.
    pub fn take<T: 'static>(&mut self, slot: &BatchSlot<T>) -> Result<T, TransportError> {
        if self.ids.get(slot.index) != Some(&slot.id) {
            return Err(TransportError::Protocol(format!(
                "slot {} (id {}) does not belong to this batch",
                slot.index, slot.id
            )));
        }
        match self.outcomes[slot.index].take() {
            Some(Ok(value)) => value.downcast::<T>().map(|v| *v).map_err(|_| {
                TransportError::Protocol(format!("slot {} has a different result type", slot.index))
            }),
            Some(Err(err)) => Err(err),
            None => Err(TransportError::Protocol(format!(
                "result for id {} already taken",
                slot.id
            ))),
        }
    }

    /// Entries that failed and have not been taken yet.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &RpcId, &TransportError)> {
        self.outcomes
            .iter()
            .zip(&self.ids)
            .enumerate()
            .filter_map(|(index, (outcome, id))| match outcome {
                Some(Err(err)) => Some((index, id, err)),
                _ => None,
            })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Move every remaining failure into one joined error.
    pub fn take_error(&mut self) -> Option<BatchError> {
        let mut entries = Vec::new();
        for (index, outcome) in self.outcomes.iter_mut().enumerate() {
            if matches!(outcome, Some(Err(_))) {
                if let Some(Err(error)) = outcome.take() {
                    entries.push(BatchEntryError {
                        index,
                        id: self.ids[index].clone(),
                        error,
                    });
                }
            }
        }
        (!entries.is_empty()).then_some(BatchError { entries })
    }
}

impl std::fmt::Debug for BatchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchResults")
            .field("len", &self.outcomes.len())
            .field("failures", &self.failures().count())
            .finish()
    }
}
