//! JSON-RPC-over-stdio loop: one request per line in, one response per
//! line out. The engine is synchronous and so is this server -- MCP
//! clients issue one tool call at a time and wait for its result, so
//! there is no concurrency to provide here (contrast `filigree-httpd`,
//! which fans a synchronous store out across concurrent async requests).

use std::io::{self, BufRead, Write};

use serde_json::{Value, json};

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::state::ServerState;
use crate::tools;

const PROTOCOL_VERSION: &str = "2024-11-05";

pub fn run(state: ServerState) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(req) => handle_request(&state, req),
            Err(e) => Some(JsonRpcResponse::failure(Value::Null, JsonRpcError::invalid_request(e.to_string()))),
        };

        if let Some(resp) = response {
            let line = serde_json::to_string(&resp)?;
            writeln!(stdout, "{line}")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Returns `None` for notifications (no `id`), which per JSON-RPC 2.0 get
/// no response at all.
fn handle_request(state: &ServerState, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let id = req.id.clone();
    let is_notification = id.is_none();

    let result = match req.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": { "name": "filigree-mcpd", "version": env!("CARGO_PKG_VERSION") },
            "capabilities": { "tools": {} },
        })),
        "notifications/initialized" | "initialized" => return None,
        "ping" => Ok(json!({})),
        "tools/list" => Ok(tools::list_tools()),
        "tools/call" => handle_tools_call(state, &req.params),
        other => {
            if is_notification {
                return None;
            }
            return Some(JsonRpcResponse::failure(id.unwrap_or(Value::Null), JsonRpcError::method_not_found(other)));
        }
    };

    if is_notification {
        return None;
    }
    let id = id.unwrap_or(Value::Null);
    match result {
        Ok(value) => Some(JsonRpcResponse::success(id, value)),
        Err(e) => Some(JsonRpcResponse::failure(id, e)),
    }
}

fn handle_tools_call(state: &ServerState, params: &Value) -> Result<Value, JsonRpcError> {
    let name = params.get("name").and_then(Value::as_str).ok_or_else(|| JsonRpcError::invalid_request("missing tool name"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    match tools::call_tool(state, name, &arguments) {
        Ok(value) => Ok(json!({
            "content": [{ "type": "text", "text": value.to_string() }],
            "isError": false,
        })),
        Err(e) => Ok(json!({
            "content": [{ "type": "text", "text": e.to_json().to_string() }],
            "isError": true,
        })),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use filigree_storage::SqliteStore;
    use filigree_templates::TemplateRegistry;

    use super::*;

    fn test_state() -> ServerState {
        ServerState {
            store: SqliteStore::open_in_memory().unwrap(),
            registry: TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap(),
            prefix: "demo".to_string(),
            project_root: std::path::PathBuf::new(),
        }
    }

    fn req(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest { jsonrpc: Some("2.0".to_string()), id: Some(json!(id)), method: method.to_string(), params }
    }

    #[test]
    fn initialize_reports_tools_capability() {
        let state = test_state();
        let resp = handle_request(&state, req(1, "initialize", json!({}))).unwrap();
        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap()["capabilities"]["tools"], json!({}));
    }

    #[test]
    fn notification_without_id_gets_no_response() {
        let state = test_state();
        let notification = JsonRpcRequest { jsonrpc: Some("2.0".to_string()), id: None, method: "ping".to_string(), params: json!({}) };
        assert!(handle_request(&state, notification).is_none());
    }

    #[test]
    fn unknown_method_reports_method_not_found() {
        let state = test_state();
        let resp = handle_request(&state, req(2, "frobnicate", json!({}))).unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[test]
    fn tools_call_wraps_tool_error_without_jsonrpc_failure() {
        let state = test_state();
        let resp = handle_request(&state, req(3, "tools/call", json!({ "name": "get_issue", "arguments": { "id": "demo-ffffffffff" } })))
            .unwrap();
        // A tool-call failure is a successful JSON-RPC call whose result carries isError: true.
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        let text = result["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["code"], "not_found");
    }

    #[test]
    fn tools_call_round_trips_create_issue() {
        let state = test_state();
        let resp = handle_request(
            &state,
            req(4, "tools/call", json!({ "name": "create_issue", "arguments": { "title": "Ship it", "actor": "agent-1" } })),
        )
        .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], json!(false));
        let text = result["content"][0]["text"].as_str().unwrap();
        let issue: Value = serde_json::from_str(text).unwrap();
        assert_eq!(issue["title"], "Ship it");
    }
}
