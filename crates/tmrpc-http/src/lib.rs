//! tmrpc-http: one POST per request or batch, no connection state.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
