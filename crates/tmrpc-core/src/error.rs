//! Transport-level error types.

use thiserror::Error;

use crate::request::{RpcError, RpcId};

/// Errors that can occur while building, sending or decoding an RPC call.
///
/// The variants are grouped so callers can always tell "my deadline passed"
/// ([`TransportError::Timeout`]) from "the connection gave up"
/// ([`TransportError::ClientClosed`]) from "the server said no"
/// ([`TransportError::Rpc`]).
#[derive(Debug, Error)]
pub enum TransportError {
    /// A parameter or envelope could not be serialized. Never sent.
    #[error("encoding error: {0}")]
    Encode(String),

    /// The remote address could not be turned into a client URL.
    #[error("invalid remote address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// HTTP request failed (connection refused, reset, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body exceeded the configured limit.
    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// WebSocket dial/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Malformed response body or a response that cannot be correlated.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error returned by the remote method itself.
    #[error("{0}")]
    Rpc(RpcError),

    /// The `result` field did not match the requested shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller's deadline passed before a response arrived.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The client was closed, or gave up reconnecting.
    #[error("client closed")]
    ClientClosed,

    /// `send` was called on a batch with no queued requests.
    #[error("batch is empty")]
    EmptyBatch,

    /// One or more batch entries failed; the others decoded fine.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl TransportError {
    /// Returns `true` if the caller's own deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the remote method rejected the call.
    pub fn is_application_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns `true` for network-level failures.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::HttpStatus { .. }
                | Self::ResponseTooLarge { .. }
                | Self::WebSocket(_)
                | Self::InvalidAddress { .. }
        )
    }

    /// Returns `true` if the client can no longer be used.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClientClosed)
    }

    /// The structured RPC error, if the server rejected the call.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }
}

/// A failure of a single batch entry.
#[derive(Debug)]
pub struct BatchEntryError {
    /// Position of the entry in the original request order.
    pub index: usize,
    /// Id of the failed request.
    pub id: RpcId,
    pub error: TransportError,
}

impl std::fmt::Display for BatchEntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry {} (id {}): {}", self.index, self.id, self.error)
    }
}

/// Joined per-entry failures of one batch send.
#[derive(Debug, Error)]
#[error("{} of the batch entries failed: {}", .entries.len(), join_entries(.entries))]
pub struct BatchError {
    pub entries: Vec<BatchEntryError>,
}

fn join_entries(entries: &[BatchEntryError]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_disjoint() {
        let timeout = TransportError::Timeout { ms: 10 };
        let closed = TransportError::ClientClosed;
        let rpc = TransportError::Rpc(RpcError {
            code: -32601,
            message: "Method not found".into(),
            data: String::new(),
        });

        assert!(timeout.is_timeout() && !timeout.is_closed() && !timeout.is_application_error());
        assert!(closed.is_closed() && !closed.is_timeout() && !closed.is_transport_error());
        assert!(rpc.is_application_error() && !rpc.is_timeout());
        assert_eq!(rpc.rpc_error().map(|e| e.code), Some(-32601));
    }

    #[test]
    fn batch_error_names_every_entry() {
        let err = BatchError {
            entries: vec![
                BatchEntryError {
                    index: 1,
                    id: RpcId::String("a-1".into()),
                    error: TransportError::Protocol("missing".into()),
                },
                BatchEntryError {
                    index: 3,
                    id: RpcId::Number(7),
                    error: TransportError::Timeout { ms: 5 },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 of the batch entries failed"));
        assert!(msg.contains("entry 1 (id a-1)"));
        assert!(msg.contains("entry 3 (id 7)"));
    }
}
