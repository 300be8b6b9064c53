//! tmrpc: client for Tendermint2 node RPC.
//!
//! [`RpcClient`] exposes the node's methods as typed async calls over either
//! transport:
//!
//! - HTTP ([`RpcClient::http`]): one POST per call or batch, no state
//! - WebSocket ([`RpcClient::ws`]): one persistent connection that
//!   reconnects on its own and replays the request it failed to write
//!
//! Batches ([`RpcClient::new_batch`]) work the same over both.

pub mod batch;
pub mod client;
pub mod methods;

#[cfg(test)]
mod testing;

pub use batch::RpcBatch;
pub use client::{RpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use methods::{AbciQueryOptions, MethodCall};

pub use tmrpc_core::{BatchResults, BatchSlot, HealthStatus, HexBytes, RpcParams, TransportError};
pub use tmrpc_http::HttpClientConfig;
pub use tmrpc_ws::{ConnectionState, WsClientConfig};
