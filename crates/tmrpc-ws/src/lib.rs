//! tmrpc-ws: persistent WebSocket JSON-RPC transport.
//!
//! # Features
//! - Responses routed to callers by request id, batches by the set of ids
//! - Auto-reconnect with exponential backoff and jitter, bounded attempts
//! - The frame that failed to write is replayed first after reconnecting
//! - Optional pings and read/write deadlines
//! - Observable connection state (`Connecting`, `Connected`, `Reconnecting`, `Closed`)

pub mod client;
pub mod config;
pub mod connector;
pub mod pending;
mod supervisor;

pub use client::WsRpcClient;
pub use config::{ConnectionState, ReconnectCallback, WsClientConfig};
pub use connector::{Connector, TungsteniteConnector, WsSink, WsStream};
pub use pending::PendingResponse;
