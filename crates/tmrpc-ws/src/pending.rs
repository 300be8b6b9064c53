//! Correlation table: who is waiting for which response.
//!
//! The table and the single-slot write backlog share one mutex. Entries are
//! registered before a frame is queued and removed exactly once, by the
//! response, by the caller giving up, or by the client closing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use tmrpc_core::error::TransportError;
use tmrpc_core::id::CorrelationKey;
use tmrpc_core::request::JsonRpcResponse;

pub(crate) type Reply = Result<Vec<JsonRpcResponse>, TransportError>;

/// One encoded request or batch, written to the socket as a single message.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub key: CorrelationKey,
    pub payload: String,
}

#[derive(Default)]
struct Shared {
    entries: HashMap<CorrelationKey, oneshot::Sender<Reply>>,
    backlog: Option<Frame>,
    last_pong: Option<Instant>,
    closed: bool,
}

#[derive(Clone, Default)]
pub(crate) struct Table {
    inner: Arc<Mutex<Shared>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, key: CorrelationKey) -> Result<oneshot::Receiver<Reply>, TransportError> {
        let mut shared = self.lock();
        if shared.closed {
            return Err(TransportError::ClientClosed);
        }
        if shared.entries.contains_key(&key) {
            return Err(TransportError::Protocol(format!(
                "a request with key {key} is already in flight"
            )));
        }
        let (tx, rx) = oneshot::channel();
        shared.entries.insert(key, tx);
        Ok(rx)
    }

    /// Deliver `responses` to whoever registered `key`. `false` on a miss.
    pub fn resolve(&self, key: &CorrelationKey, responses: Vec<JsonRpcResponse>) -> bool {
        let Some(tx) = self.lock().entries.remove(key) else {
            return false;
        };
        // the receiver may have been dropped in the meantime
        tx.send(Ok(responses)).is_ok()
    }

    pub fn remove(&self, key: &CorrelationKey) {
        self.lock().entries.remove(key);
    }

    pub fn is_live(&self, key: &CorrelationKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn set_backlog(&self, frame: Frame) {
        self.lock().backlog = Some(frame);
    }

    pub fn take_backlog(&self) -> Option<Frame> {
        self.lock().backlog.take()
    }

    pub fn record_pong(&self) {
        self.lock().last_pong = Some(Instant::now());
    }

    pub fn since_last_pong(&self) -> Option<Duration> {
        self.lock().last_pong.map(|at| at.elapsed())
    }

    /// Reject new registrations and fail every waiting caller.
    pub fn close(&self) -> usize {
        let entries = {
            let mut shared = self.lock();
            shared.closed = true;
            shared.backlog = None;
            std::mem::take(&mut shared.entries)
        };
        let n = entries.len();
        for (_, tx) in entries {
            let _ = tx.send(Err(TransportError::ClientClosed));
        }
        n
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("pending", &self.len()).finish()
    }
}

/// Handle to a request that has been queued for writing.
///
/// Dropping the handle abandons the call; a response arriving later is
/// logged and discarded.
#[derive(Debug)]
pub struct PendingResponse {
    key: CorrelationKey,
    rx: oneshot::Receiver<Reply>,
    table: Table,
}

impl PendingResponse {
    pub(crate) fn new(key: CorrelationKey, rx: oneshot::Receiver<Reply>, table: Table) -> Self {
        Self { key, rx, table }
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Wait for the raw responses, in the order the server sent them.
    pub async fn recv(mut self) -> Result<Vec<JsonRpcResponse>, TransportError> {
        match (&mut self.rx).await {
            Ok(reply) => reply,
            Err(_) => Err(TransportError::ClientClosed),
        }
    }

    /// [`PendingResponse::recv`] bounded by `timeout`.
    pub async fn recv_timeout(
        self,
        timeout: Duration,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .unwrap_or(Err(TransportError::Timeout {
                ms: timeout.as_millis() as u64,
            }))
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.table.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tmrpc_core::request::RpcId;

    fn key(id: &str) -> CorrelationKey {
        CorrelationKey::Single(RpcId::from(id))
    }

    #[tokio::test]
    async fn resolve_delivers_once() {
        let table = Table::new();
        let rx = table.register(key("a")).unwrap();
        let pending = PendingResponse::new(key("a"), rx, table.clone());

        let resp = JsonRpcResponse::success(RpcId::from("a"), json!(1));
        assert!(table.resolve(&key("a"), vec![resp.clone()]));
        assert!(!table.resolve(&key("a"), vec![resp]));
        assert_eq!(pending.recv().await.unwrap().len(), 1);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn duplicate_key_rejected() {
        let table = Table::new();
        let _rx = table.register(key("a")).unwrap();
        assert!(matches!(table.register(key("a")), Err(TransportError::Protocol(_))));
    }

    #[tokio::test]
    async fn dropping_handle_removes_entry() {
        let table = Table::new();
        let rx = table.register(key("a")).unwrap();
        let pending = PendingResponse::new(key("a"), rx, table.clone());
        assert!(table.is_live(&key("a")));
        drop(pending);
        assert!(!table.is_live(&key("a")));
    }

    #[tokio::test]
    async fn timeout_removes_entry() {
        let table = Table::new();
        let rx = table.register(key("a")).unwrap();
        let pending = PendingResponse::new(key("a"), rx, table.clone());
        let err = pending.recv_timeout(Duration::from_millis(10)).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn close_fails_waiters_and_rejects_new_calls() {
        let table = Table::new();
        let rx = table.register(key("a")).unwrap();
        let pending = PendingResponse::new(key("a"), rx, table.clone());
        table.set_backlog(Frame {
            key: key("a"),
            payload: "{}".into(),
        });

        assert_eq!(table.close(), 1);
        assert!(matches!(pending.recv().await, Err(TransportError::ClientClosed)));
        assert!(table.take_backlog().is_none());
        assert!(matches!(table.register(key("b")), Err(TransportError::ClientClosed)));
    }
}
