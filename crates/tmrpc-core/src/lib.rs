//! tmrpc-core: wire types, correlation and batching shared by every tmrpc transport.
//!
//! # Overview
//!
//! - [`RpcTransport`]: the async trait the HTTP and WebSocket clients implement
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: JSON-RPC 2.0 envelopes with named params
//! - [`IdGenerator`] / [`CorrelationKey`]: request ids and the key responses are routed by
//! - [`Batch`]: typed client-side batching over any transport
//! - [`Backoff`]: exponential reconnect delays with jitter
//! - [`HexBytes`]: byte payloads carried as `0x`-prefixed hex

pub mod address;
pub mod backoff;
pub mod batch;
pub mod error;
pub mod hex_bytes;
pub mod id;
pub mod request;
pub mod transport;

pub use backoff::{Backoff, BackoffConfig};
pub use batch::{Batch, BatchResults, BatchSlot};
pub use error::{BatchEntryError, BatchError, TransportError};
pub use hex_bytes::HexBytes;
pub use id::{CorrelationKey, IdGenerator};
pub use request::{parse_responses, JsonRpcRequest, JsonRpcResponse, RpcError, RpcId, RpcParams};
pub use transport::{HealthStatus, RpcTransport};
