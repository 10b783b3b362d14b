//! JSON-RPC 2.0 envelopes shared by the HTTP and TCP transports.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AdapterError, AdapterResult};
use crate::protocol_constants::JSONRPC_VERSION;

/// Outgoing request.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Error object carried in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Any incoming message: a response (has `id`) or a notification (has `method`).
#[derive(Debug, Deserialize)]
pub struct RpcMessage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RpcMessage {
    /// Converts a response into its `result`, surfacing RPC-reported errors.
    pub fn into_result(self) -> AdapterResult<Value> {
        if let Some(err) = self.error {
            let message = match err.data {
                Some(Value::String(detail)) => format!("{} ({})", err.message, detail),
                _ => err.message,
            };
            return Err(AdapterError::Rpc {
                code: err.code,
                message,
            });
        }
        self.result
            .ok_or_else(|| AdapterError::Parse("response has neither result nor error".into()))
    }
}

/// Monotonic request id source.
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_as_jsonrpc_2() {
        let params = json!({ "id": "c1" });
        let req = RpcRequest::new(7, "Client.SetStream", &params);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "Client.SetStream");
        assert_eq!(value["params"]["id"], "c1");
    }

    #[test]
    fn error_object_becomes_rpc_error() {
        let msg: RpcMessage = serde_json::from_value(json!({
            "id": 1,
            "jsonrpc": "2.0",
            "error": { "code": -32602, "message": "Invalid params", "data": "Client not found" }
        }))
        .unwrap();

        match msg.into_result() {
            Err(AdapterError::Rpc { code, message }) => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Invalid params (Client not found)");
            }
            other => panic!("Expected Rpc error, got {:?}", other),
        }
    }

    #[test]
    fn missing_result_is_parse_error() {
        let msg: RpcMessage = serde_json::from_value(json!({ "id": 1, "jsonrpc": "2.0" })).unwrap();
        assert!(matches!(msg.into_result(), Err(AdapterError::Parse(_))));
    }

    #[test]
    fn notification_has_no_id() {
        let msg: RpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "Client.OnVolumeChanged",
            "params": { "id": "c1", "volume": { "percent": 10, "muted": false } }
        }))
        .unwrap();
        assert!(msg.id.is_none());
        assert_eq!(msg.method.as_deref(), Some("Client.OnVolumeChanged"));
    }

    #[test]
    fn request_ids_increase() {
        let ids = RequestIds::new();
        let a = ids.next();
        let b = ids.next();
        assert!(b > a);
    }
}
