//! Minimal MCP tool provider exposing `add` and `multiply` over stdio.

use std::io::{self, BufRead, Write};

use mcp::{JsonRpcResponse, METHOD_NOT_FOUND, PROTOCOL_VERSION, RequestId};
use serde_json::{Value, json};

const INVALID_PARAMS: i32 = -32602;

fn main() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        // Notifications carry no id and get no reply.
        let Some(id) = message
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
        else {
            continue;
        };

        let method = message["method"].as_str().unwrap_or_default();
        let response = handle(id, method, &message["params"]);
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle(id: RequestId, method: &str, params: &Value) -> JsonRpcResponse {
    match method {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": params["protocolVersion"].as_str().unwrap_or(PROTOCOL_VERSION),
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "calculator", "version": env!("CARGO_PKG_VERSION")},
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(
            id,
            json!({"tools": [
                tool("add", "Adds two numbers."),
                tool("multiply", "Multiplies two numbers."),
            ]}),
        ),
        "tools/call" => call(id, params),
        other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("unknown method {other}")),
    }
}

fn tool(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {
                "a": {"title": "A", "type": "integer"},
                "b": {"title": "B", "type": "integer"},
            },
            "required": ["a", "b"],
        },
    })
}

fn call(id: RequestId, params: &Value) -> JsonRpcResponse {
    let op: fn(i64, i64) -> Option<i64> = match params["name"].as_str() {
        Some("add") => i64::checked_add,
        Some("multiply") => i64::checked_mul,
        Some(other) => {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Unknown tool: {other}"));
        }
        None => return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing tool name"),
    };

    let args = &params["arguments"];
    let outcome = match (args["a"].as_i64(), args["b"].as_i64()) {
        (Some(a), Some(b)) => op(a, b).map(|n| n.to_string()).ok_or("integer overflow"),
        _ => Err("arguments `a` and `b` must be integers"),
    };

    let result = match outcome {
        Ok(text) => json!({"content": [{"type": "text", "text": text}], "isError": false}),
        Err(message) => json!({"content": [{"type": "text", "text": message}], "isError": true}),
    };
    JsonRpcResponse::success(id, result)
}
