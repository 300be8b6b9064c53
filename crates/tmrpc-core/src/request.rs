//! JSON-RPC 2.0 wire types and the envelope codec.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;

/// Protocol version tag carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request ID: string, integer, or null.
///
/// `"1"` and `1` are different ids and never match each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
    #[default]
    Null,
}

impl RpcId {
    pub fn number(n: i64) -> Self {
        Self::Number(n)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for RpcId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RpcId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RpcId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl<'de> Deserialize<'de> for RpcId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::Null),
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Number(i)),
                // ids SHOULD NOT carry decimals; truncate the ones that do
                None => n
                    .as_f64()
                    .map(|f| Self::Number(f.trunc() as i64))
                    .ok_or_else(|| serde::de::Error::custom(format!("unsupported id {n}"))),
            },
            other => Err(serde::de::Error::custom(format!(
                "JSON-RPC id must be a string or a number, got {other}"
            ))),
        }
    }
}

/// Named request parameters, each value encoded independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcParams(Map<String, Value>);

impl RpcParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `value` and store it under `name`.
    pub fn insert<T: Serialize + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), TransportError> {
        let name = name.into();
        let encoded = serde_json::to_value(value)
            .map_err(|e| TransportError::Encode(format!("param {name}: {e}")))?;
        self.0.insert(name, encoded);
        Ok(())
    }

    /// Chaining form of [`RpcParams::insert`].
    pub fn with<T: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, TransportError> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Store an already-encoded value.
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Chaining form of [`RpcParams::insert_value`].
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_value(name, value.into());
        self
    }

    /// Build params from any value that serializes to a JSON object.
    pub fn from_serialize<P: Serialize + ?Sized>(params: &P) -> Result<Self, TransportError> {
        match serde_json::to_value(params).map_err(TransportError::encode)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(TransportError::Encode(format!(
                "params must encode to a JSON object, got {other}"
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RpcId,
    pub method: String,
    #[serde(default)]
    pub params: RpcParams,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: impl Into<RpcId>, method: impl Into<String>, params: RpcParams) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Build a request from a serializable parameter struct or map.
    pub fn build<P: Serialize + ?Sized>(
        id: impl Into<RpcId>,
        method: impl Into<String>,
        params: &P,
    ) -> Result<Self, TransportError> {
        Ok(Self::new(id, method, RpcParams::from_serialize(params)?))
    }
}

impl std::fmt::Display for JsonRpcRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]", self.id, self.method)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: String::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.data.is_empty() {
            write!(f, "RPC error {} - {}", self.code, self.message)
        } else {
            write!(f, "RPC error {} - {}: {}", self.code, self.message, self.data)
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echo of the request id; `Null` for some server-side parse failures.
    #[serde(default)]
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<RpcId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<RpcId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` if this is a successful response (has result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Unwrap the result value or return the RPC error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }

    /// Decode the `result` into `T`.
    ///
    /// An `error` field short-circuits to [`TransportError::Rpc`] without
    /// attempting to decode anything.
    pub fn decode_into<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        let value = self.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(value).map_err(TransportError::Decode)
    }
}

/// Parse a frame that holds either a batch array or a single response.
pub fn parse_responses(data: &[u8]) -> Result<Vec<JsonRpcResponse>, TransportError> {
    match serde_json::from_slice::<Vec<JsonRpcResponse>>(data) {
        Ok(responses) => Ok(responses),
        Err(_) => serde_json::from_slice::<JsonRpcResponse>(data)
            .map(|response| vec![response])
            .map_err(|e| TransportError::Protocol(format!("unable to parse RPC response: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex_bytes::HexBytes;
    use serde_json::json;

    #[test]
    fn request_serialization() {
        let params = RpcParams::new().with("height", &10).unwrap();
        let req = JsonRpcRequest::new("abc-1", "block", params);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","id":"abc-1","method":"block","params":{"height":10}}"#
        );
    }

    #[test]
    fn string_and_integer_ids_stay_distinct() {
        let s: RpcId = serde_json::from_str(r#""1""#).unwrap();
        let n: RpcId = serde_json::from_str("1").unwrap();
        assert_eq!(s, RpcId::String("1".into()));
        assert_eq!(n, RpcId::Number(1));
        assert_ne!(s, n);
        assert_eq!(serde_json::to_string(&s).unwrap(), r#""1""#);
        assert_eq!(serde_json::to_string(&n).unwrap(), "1");
    }

    #[test]
    fn fractional_ids_are_truncated() {
        let id: RpcId = serde_json::from_str("4.7").unwrap();
        assert_eq!(id, RpcId::Number(4));
        assert!(serde_json::from_str::<RpcId>("[1]").is_err());
    }

    #[test]
    fn missing_or_null_response_id_is_null() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error. Invalid JSON"}}"#,
        )
        .unwrap();
        assert!(resp.id.is_null());

        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":null,"result":1}"#).unwrap();
        assert!(resp.id.is_null());
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to encode"))
        }
    }

    #[test]
    fn failed_param_aborts_envelope() {
        let err = RpcParams::new()
            .with("ok", &1)
            .and_then(|p| p.with("bad", &Unencodable))
            .unwrap_err();
        assert!(matches!(err, TransportError::Encode(ref m) if m.contains("param bad")));
    }

    #[test]
    fn non_object_params_rejected() {
        let err = JsonRpcRequest::build("x", "status", &[1, 2]).unwrap_err();
        assert!(matches!(err, TransportError::Encode(_)));
    }

    #[test]
    fn decode_error_response_returns_error_verbatim() {
        let resp = JsonRpcResponse::failure(
            "id-1",
            RpcError::new(-32000, "execution reverted").with_data("out of gas"),
        );
        assert!(!resp.is_ok());
        match resp.decode_into::<u64>() {
            Err(TransportError::Rpc(err)) => {
                assert_eq!(err.code, -32000);
                assert_eq!(err.message, "execution reverted");
                assert_eq!(err.data, "out of gas");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn decode_shape_mismatch_is_typed_error() {
        let resp = JsonRpcResponse::success(RpcId::Number(1), json!({"height": "ten"}));
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Height {
            height: u64,
        }
        let err = resp.decode_into::<Height>().unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn round_trip_through_wire() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Query {
            path: String,
            data: HexBytes,
            opts: std::collections::BTreeMap<String, Value>,
        }
        let original = Query {
            path: ".store/main".into(),
            data: HexBytes(vec![0xde, 0xad, 0x00, 0x01]),
            opts: [("height".to_string(), json!(12)), ("prove".to_string(), json!(true))]
                .into_iter()
                .collect(),
        };

        for id in [RpcId::String("c-1".into()), RpcId::Number(42)] {
            let req = JsonRpcRequest::build(id.clone(), "abci_query", &original).unwrap();
            let wire = serde_json::to_vec(&req).unwrap();
            let back: JsonRpcRequest = serde_json::from_slice(&wire).unwrap();
            assert_eq!(back, req);

            // echo the params back as a result, the way a server would
            let resp = JsonRpcResponse::success(back.id, serde_json::to_value(&back.params).unwrap());
            let wire = serde_json::to_vec(&resp).unwrap();
            let resp: JsonRpcResponse = serde_json::from_slice(&wire).unwrap();
            assert_eq!(resp.id, id);
            let decoded: Query = resp.decode_into().unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn parse_single_and_batch_frames() {
        let single = parse_responses(br#"{"jsonrpc":"2.0","id":"a","result":true}"#).unwrap();
        assert_eq!(single.len(), 1);

        let batch = parse_responses(
            br#"[{"jsonrpc":"2.0","id":"a","result":1},{"jsonrpc":"2.0","id":2,"result":2}]"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].id, RpcId::Number(2));

        assert!(matches!(parse_responses(b"not json"), Err(TransportError::Protocol(_))));
    }
}
