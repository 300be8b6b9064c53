//! The `RpcTransport` trait: the seam between the client facade and the wire.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::id::IdGenerator;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Transport health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Connected, or stateless and ready.
    Healthy,
    /// Temporarily disconnected and trying to recover.
    Degraded,
    /// Closed for good.
    Unhealthy,
    /// Health status is unknown (not yet checked).
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The async trait every RPC transport implements.
///
/// # Cancellation
/// Neither method takes a deadline. Callers bound them with
/// `tokio::time::timeout`, or drop the future to cancel; transports clean up
/// any per-call state when that happens.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the matching response.
    async fn send_request(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of JSON-RPC requests as one unit.
    ///
    /// Responses come back in whatever order the server chose; match them by id.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError>;

    /// Id generator for requests sent through this transport.
    fn ids(&self) -> &IdGenerator;

    /// Return the current health status of this transport.
    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Release the transport. Further sends fail with
    /// [`TransportError::ClientClosed`] where the transport holds state.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
