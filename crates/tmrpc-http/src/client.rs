//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Every call is one `POST` carrying either a single envelope or a JSON
//! array of envelopes. Nothing is retried and no state survives between
//! calls; cancelling is dropping the future.

use async_trait::async_trait;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tmrpc_core::address::http_url;
use tmrpc_core::error::TransportError;
use tmrpc_core::id::IdGenerator;
use tmrpc_core::request::{JsonRpcRequest, JsonRpcResponse};
use tmrpc_core::transport::{HealthStatus, RpcTransport};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request deadline enforced by `reqwest`.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bodies above this size are rejected before they are parsed.
    pub max_response_bytes: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

impl HttpClientConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }
}

/// Stateless HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    ids: IdGenerator,
    request_timeout: Duration,
    max_response_bytes: usize,
}

impl HttpRpcClient {
    /// Create a client for `remote`, which may be an `http(s)://` URL, a
    /// `tcp://` address or a bare `host:port`.
    pub fn new(remote: &str, config: HttpClientConfig) -> Result<Self, TransportError> {
        let url = http_url(remote)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            url,
            http,
            ids: IdGenerator::new("http-client"),
            request_timeout: config.request_timeout,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Create with default configuration.
    pub fn default_for(remote: &str) -> Result<Self, TransportError> {
        Self::new(remote, HttpClientConfig::default())
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    /// POST an already-encoded body and return the raw response bytes.
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = resp.status();
        let bytes = self.read_limited(resp).await?;
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes)
    }

    async fn read_limited(&self, mut resp: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        let limit = self.max_response_bytes;
        if resp.content_length().is_some_and(|len| len > limit as u64) {
            return Err(TransportError::ResponseTooLarge { limit });
        }
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.map_reqwest(e))? {
            if body.len() + chunk.len() > limit {
                return Err(TransportError::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(value).map_err(|e| TransportError::Encode(e.to_string()))
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send_request(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::debug!(url = %self.url, request = %req, "POST request");
        let body = self.post(encode(&req)?).await?;

        let resp: JsonRpcResponse = serde_json::from_slice(&body).map_err(|e| {
            TransportError::Protocol(format!("unable to parse RPC response: {e}"))
        })?;
        // servers answer unparseable requests with a null id
        if resp.id != req.id && !resp.id.is_null() {
            return Err(TransportError::Protocol(format!(
                "response id {} does not match request id {}",
                resp.id, req.id
            )));
        }
        Ok(resp)
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        tracing::debug!(url = %self.url, count = reqs.len(), "POST batch");
        let body = self.post(encode(&reqs)?).await?;

        match serde_json::from_slice::<Vec<JsonRpcResponse>>(&body) {
            Ok(responses) => Ok(responses),
            // a lone object means the server rejected the batch as a whole
            Err(e) => match serde_json::from_slice::<JsonRpcResponse>(&body) {
                Ok(JsonRpcResponse {
                    error: Some(err), ..
                }) => Err(TransportError::Rpc(err)),
                _ => Err(TransportError::Protocol(format!(
                    "expected a batch response array: {e}"
                ))),
            },
        }
    }

    fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    fn health(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tmrpc_core::request::{RpcId, RpcParams};
    use tmrpc_core::Batch;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    fn echo_one(req: &Value) -> Value {
        json!({"jsonrpc": "2.0", "id": req["id"], "result": req["params"]})
    }

    /// Echoes params back as the result; batches are answered in reverse.
    async fn echo(headers: HeaderMap, body: Bytes) -> Response {
        if headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
            != Some("application/json")
        {
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
        let value: Value = serde_json::from_slice(&body).unwrap();
        match value {
            Value::Array(reqs) => {
                Json(Value::Array(reqs.iter().rev().map(echo_one).collect())).into_response()
            }
            req => Json(echo_one(&req)).into_response(),
        }
    }

    fn request(method: &str, height: i64) -> JsonRpcRequest {
        JsonRpcRequest::new(
            RpcId::from(format!("id-{height}")),
            method,
            RpcParams::new().with("height", &height).unwrap(),
        )
    }

    #[tokio::test]
    async fn single_request_round_trip() {
        let addr = serve(Router::new().route("/", post(echo))).await;
        let client = HttpRpcClient::default_for(&format!("tcp://{addr}")).unwrap();
        assert_eq!(client.url(), format!("http://{addr}"));

        let resp = client.send_request(request("block", 7)).await.unwrap();
        assert_eq!(resp.id, RpcId::from("id-7"));
        assert_eq!(resp.result, Some(json!({"height": 7})));
        assert_eq!(client.health(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn batch_is_one_post_with_array_body() {
        let addr = serve(Router::new().route("/", post(echo))).await;
        let client = HttpRpcClient::default_for(&addr).unwrap();

        let resps = client
            .send_batch(vec![request("block", 1), request("block", 2), request("commit", 3)])
            .await
            .unwrap();
        let ids: Vec<_> = resps.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, ["id-3", "id-2", "id-1"]);
    }

    #[tokio::test]
    async fn batch_aggregator_decodes_in_request_order() {
        let addr = serve(Router::new().route("/", post(echo))).await;
        let client = Arc::new(HttpRpcClient::default_for(&addr).unwrap());

        #[derive(serde::Deserialize)]
        struct Height {
            height: i64,
        }
        let mut batch = Batch::new(client);
        let slots: Vec<_> = (1..=3)
            .map(|h| {
                batch
                    .add::<Height, _>("block", &json!({ "height": h }))
                    .unwrap()
            })
            .collect();
        let mut results = batch.send().await.unwrap();
        for (slot, expected) in slots.iter().zip(1..=3) {
            assert_eq!(results.take(slot).unwrap().height, expected);
        }
    }

    #[tokio::test]
    async fn non_2xx_reports_status_and_body() {
        let app = Router::new().route(
            "/",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "node is catching up") }),
        );
        let addr = serve(app).await;
        let client = HttpRpcClient::default_for(&addr).unwrap();

        match client.send_request(request("status", 0)).await {
            Err(TransportError::HttpStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "node is catching up");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = Router::new().route(
            "/",
            post(|| async {
                Json(json!({"jsonrpc": "2.0", "id": "id-0", "result": "x".repeat(4096)}))
            }),
        );
        let addr = serve(app).await;
        let config = HttpClientConfig::default().with_max_response_bytes(256);
        let client = HttpRpcClient::new(&addr, config).unwrap();

        let err = client.send_request(request("status", 0)).await.unwrap_err();
        assert!(matches!(err, TransportError::ResponseTooLarge { limit: 256 }));
    }

    #[tokio::test]
    async fn garbage_body_is_protocol_error() {
        let app = Router::new().route("/", post(|| async { "<html>oops</html>" }));
        let addr = serve(app).await;
        let client = HttpRpcClient::default_for(&addr).unwrap();

        let err = client.send_request(request("status", 0)).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[tokio::test]
    async fn mismatched_id_is_protocol_error() {
        let app = Router::new().route(
            "/",
            post(|| async { Json(json!({"jsonrpc": "2.0", "id": "someone-else", "result": 1})) }),
        );
        let addr = serve(app).await;
        let client = HttpRpcClient::default_for(&addr).unwrap();

        let err = client.send_request(request("status", 0)).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ref m) if m.contains("someone-else")));
    }

    #[tokio::test]
    async fn batch_rejected_as_a_whole_fails_atomically() {
        let app = Router::new().route(
            "/",
            post(|| async {
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {"code": -32600, "message": "Invalid Request"}
                }))
            }),
        );
        let addr = serve(app).await;
        let client = HttpRpcClient::default_for(&addr).unwrap();

        let err = client
            .send_batch(vec![request("block", 1), request("block", 2)])
            .await
            .unwrap_err();
        assert_eq!(err.rpc_error().map(|e| e.code), Some(-32600));
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpRpcClient::default_for(&addr.to_string()).unwrap();
        let err = client.send_request(request("status", 0)).await.unwrap_err();
        assert!(err.is_transport_error(), "{err:?}");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(matches!(
            HttpRpcClient::default_for("unix:///tmp/node.sock"),
            Err(TransportError::InvalidAddress { .. })
        ));
    }
}
