//! Methods served by a Tendermint2 node and the named params each one takes.

use serde_json::Value;

use tmrpc_core::hex_bytes::HexBytes;
use tmrpc_core::request::RpcParams;

pub const STATUS: &str = "status";
pub const ABCI_INFO: &str = "abci_info";
pub const ABCI_QUERY: &str = "abci_query";
pub const BROADCAST_TX_COMMIT: &str = "broadcast_tx_commit";
pub const BROADCAST_TX_SYNC: &str = "broadcast_tx_sync";
pub const BROADCAST_TX_ASYNC: &str = "broadcast_tx_async";
pub const UNCONFIRMED_TXS: &str = "unconfirmed_txs";
pub const NUM_UNCONFIRMED_TXS: &str = "num_unconfirmed_txs";
pub const NET_INFO: &str = "net_info";
pub const DUMP_CONSENSUS_STATE: &str = "dump_consensus_state";
pub const CONSENSUS_STATE: &str = "consensus_state";
pub const CONSENSUS_PARAMS: &str = "consensus_params";
pub const HEALTH: &str = "health";
pub const BLOCKCHAIN: &str = "blockchain";
pub const GENESIS: &str = "genesis";
pub const BLOCK: &str = "block";
pub const BLOCK_RESULTS: &str = "block_results";
pub const COMMIT: &str = "commit";
pub const TX: &str = "tx";
pub const VALIDATORS: &str = "validators";

/// Options for `abci_query`. Height 0 means the latest block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbciQueryOptions {
    pub height: i64,
    pub prove: bool,
}

/// A method name together with its encoded params.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: &'static str,
    pub params: RpcParams,
}

impl MethodCall {
    fn new(method: &'static str) -> Self {
        Self {
            method,
            params: RpcParams::new(),
        }
    }

    fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert_value(name, value.into());
        self
    }

    /// `height` is left out entirely when unset; the node picks the latest.
    fn height(self, height: Option<i64>) -> Self {
        match height {
            Some(height) => self.param("height", height),
            None => self,
        }
    }
}

pub fn status() -> MethodCall {
    MethodCall::new(STATUS)
}

pub fn abci_info() -> MethodCall {
    MethodCall::new(ABCI_INFO)
}

pub fn abci_query(path: &str, data: &[u8], opts: AbciQueryOptions) -> MethodCall {
    MethodCall::new(ABCI_QUERY)
        .param("path", path)
        .param("data", HexBytes::from(data))
        .param("height", opts.height)
        .param("prove", opts.prove)
}

/// `method` is one of the three `broadcast_tx_*` routes.
pub fn broadcast_tx(method: &'static str, tx: &[u8]) -> MethodCall {
    MethodCall::new(method).param("tx", HexBytes::from(tx))
}

pub fn unconfirmed_txs(limit: i64) -> MethodCall {
    MethodCall::new(UNCONFIRMED_TXS).param("limit", limit)
}

pub fn num_unconfirmed_txs() -> MethodCall {
    MethodCall::new(NUM_UNCONFIRMED_TXS)
}

pub fn net_info() -> MethodCall {
    MethodCall::new(NET_INFO)
}

pub fn dump_consensus_state() -> MethodCall {
    MethodCall::new(DUMP_CONSENSUS_STATE)
}

pub fn consensus_state() -> MethodCall {
    MethodCall::new(CONSENSUS_STATE)
}

pub fn consensus_params(height: Option<i64>) -> MethodCall {
    MethodCall::new(CONSENSUS_PARAMS).height(height)
}

pub fn health() -> MethodCall {
    MethodCall::new(HEALTH)
}

pub fn blockchain_info(min_height: i64, max_height: i64) -> MethodCall {
    MethodCall::new(BLOCKCHAIN)
        .param("minHeight", min_height)
        .param("maxHeight", max_height)
}

pub fn genesis() -> MethodCall {
    MethodCall::new(GENESIS)
}

pub fn block(height: Option<i64>) -> MethodCall {
    MethodCall::new(BLOCK).height(height)
}

pub fn block_results(height: Option<i64>) -> MethodCall {
    MethodCall::new(BLOCK_RESULTS).height(height)
}

pub fn commit(height: Option<i64>) -> MethodCall {
    MethodCall::new(COMMIT).height(height)
}

pub fn tx(hash: &[u8]) -> MethodCall {
    MethodCall::new(TX).param("hash", HexBytes::from(hash))
}

pub fn validators(height: Option<i64>) -> MethodCall {
    MethodCall::new(VALIDATORS).height(height)
}
