//! The facade against a small axum stand-in for a node.

use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use tmrpc::{RpcClient, TransportError};

fn handle(req: &Value) -> Value {
    let id = req["id"].clone();
    match req["method"].as_str() {
        Some("status") => json!({"jsonrpc": "2.0", "id": id, "result": {
            "node_info": {"network": "dev"},
            "sync_info": {"latest_block_height": "42"}
        }}),
        Some("block") => json!({"jsonrpc": "2.0", "id": id, "result": {
            "block": {"header": {"height": req["params"]["height"].to_string()}}
        }}),
        _ => json!({"jsonrpc": "2.0", "id": id, "error": {
            "code": -32601, "message": "Method not found"
        }}),
    }
}

async fn node(Json(body): Json<Value>) -> Json<Value> {
    Json(match body {
        Value::Array(reqs) => Value::Array(reqs.iter().rev().map(handle).collect()),
        req => handle(&req),
    })
}

async fn start_node() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/", post(node)))
            .await
            .unwrap();
    });
    format!("tcp://{addr}")
}

#[derive(Debug, Deserialize)]
struct Status {
    node_info: NodeInfo,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    network: String,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[tokio::test]
async fn status_over_http() {
    let client = RpcClient::http(&start_node().await).unwrap();
    let status: Status = client.status().await.unwrap();
    assert_eq!(status.node_info.network, "dev");
    assert_eq!(status.sync_info.latest_block_height, "42");
}

#[tokio::test]
async fn batch_over_http_mixes_results_and_errors() {
    let client = RpcClient::http(&start_node().await).unwrap();
    let mut batch = client.new_batch();
    let status = batch.status::<Status>();
    let missing = batch.call::<Value>("no_such_method", Default::default());
    let block = batch.block::<Value>(Some(7));

    let mut results = batch.send().await.unwrap();
    assert_eq!(results.take(&status).unwrap().node_info.network, "dev");
    assert_eq!(results.take(&block).unwrap()["block"]["header"]["height"], "7");

    let err = results.take_error().expect("one entry failed");
    assert_eq!(err.entries.len(), 1);
    assert_eq!(err.entries[0].index, missing.index());
    assert!(matches!(err.entries[0].error, TransportError::Rpc(ref e) if e.code == -32601));
}
