//! JSON-RPC 2.0 envelope types for the MCP stdio transport (spec §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        JsonRpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        JsonRpcResponse { jsonrpc: "2.0", id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// JSON-RPC reserved code for a method name the server doesn't implement.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// JSON-RPC reserved code for a request that doesn't parse as valid JSON-RPC.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Non-reserved code used for tool-call failures; the tool-call error
    /// taxonomy travels in `data` as `{error, code}` per spec §6.
    pub const TOOL_ERROR: i64 = -32000;

    pub fn method_not_found(method: &str) -> Self {
        JsonRpcError {
            code: Self::METHOD_NOT_FOUND,
            message: format!("unknown method: {method}"),
            data: None,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        JsonRpcError { code: Self::INVALID_REQUEST, message: msg.into(), data: None }
    }
}
