//! In-memory transport for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use tmrpc_core::error::TransportError;
use tmrpc_core::id::IdGenerator;
use tmrpc_core::request::{JsonRpcRequest, JsonRpcResponse, RpcError};
use tmrpc_core::transport::RpcTransport;

enum Mode {
    Echo,
    Fail(RpcError),
    Stall,
}

/// Records every request. Echo mode answers `{"method", "params"}`,
/// batches in reverse order.
pub(crate) struct RecordingTransport {
    ids: IdGenerator,
    mode: Mode,
    sent: Mutex<Vec<JsonRpcRequest>>,
}

impl RecordingTransport {
    fn with_mode(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            ids: IdGenerator::new("recording"),
            mode,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn echo() -> Arc<Self> {
        Self::with_mode(Mode::Echo)
    }

    pub fn failing(err: RpcError) -> Arc<Self> {
        Self::with_mode(Mode::Fail(err))
    }

    pub fn stalled() -> Arc<Self> {
        Self::with_mode(Mode::Stall)
    }

    pub fn sent(&self) -> Vec<JsonRpcRequest> {
        self.sent.lock().unwrap().clone()
    }

    async fn answer(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        self.sent.lock().unwrap().push(req.clone());
        match &self.mode {
            Mode::Echo => JsonRpcResponse::success(
                req.id,
                json!({"method": req.method, "params": req.params}),
            ),
            Mode::Fail(err) => JsonRpcResponse::failure(req.id, err.clone()),
            Mode::Stall => std::future::pending().await,
        }
    }
}

#[async_trait]
impl RpcTransport for RecordingTransport {
    async fn send_request(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        Ok(self.answer(req).await)
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut out = Vec::with_capacity(reqs.len());
        for req in reqs.into_iter().rev() {
            out.push(self.answer(req).await);
        }
        Ok(out)
    }

    fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    fn url(&self) -> &str {
        "recording://"
    }
}
