//! Model Context Protocol framing over stdio.
//!
//! Newline-delimited JSON-RPC 2.0: one request per line on stdin, one
//! response per line on stdout. Diagnostics never touch stdout; they go to
//! the tracing subscriber on stderr.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::tools::{ToolError, Toolbox};

/// The MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize, PartialEq)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize, PartialEq)]
struct RpcError {
    code: i64,
    message: String,
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Serves the toolbox over stdin/stdout until stdin closes.
pub async fn serve(tools: Toolbox) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!("serving MCP on stdio");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_line(&tools, &line) {
            let mut frame = serde_json::to_string(&response)?;
            frame.push('\n');
            stdout.write_all(frame.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}

/// Handles one raw frame. Returns `None` for notifications.
fn handle_line(tools: &Toolbox, line: &str) -> Option<Response> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            return Some(Response::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {err}"),
            ));
        }
    };
    let Some(id) = request.id else {
        // A notification; nothing is sent back.
        tracing::debug!(method = %request.method, "notification");
        return None;
    };
    Some(handle_request(tools, id, &request.method, request.params))
}

fn handle_request(tools: &Toolbox, id: Value, method: &str, params: Value) -> Response {
    match method {
        "initialize" => Response::result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => Response::result(id, json!({})),
        "tools/list" => Response::result(id, json!({ "tools": Toolbox::catalog() })),
        "tools/call" => {
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return Response::error(id, INVALID_REQUEST, "tools/call requires a tool name");
            };
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
            match tools.call(name, arguments) {
                Ok(text) => Response::result(
                    id,
                    json!({ "content": [{ "type": "text", "text": text }] }),
                ),
                Err(err @ ToolError::InvalidArgs(_)) => {
                    Response::error(id, INVALID_PARAMS, err.to_string())
                }
                Err(err) => {
                    tracing::warn!(tool = name, "{err}");
                    Response::result(
                        id,
                        json!({
                            "content": [{ "type": "text", "text": err.to_string() }],
                            "isError": true,
                        }),
                    )
                }
            }
        }
        other => Response::error(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeldb::ModelDb;

    fn toolbox() -> Toolbox {
        let mut db = ModelDb::open_in_memory().unwrap();
        let input = ".model nfet nmos l=0.18u w=1u\n";
        for record in netlist::Parser::new(input, "server.sp", Default::default()) {
            db.insert_record(&record).unwrap();
        }
        Toolbox::new(db)
    }

    #[test]
    fn initialize_reports_protocol_and_tools_capability() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        )
        .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn tools_list_contains_the_catalog() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        )
        .unwrap();
        let tools = response.result.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn tools_call_returns_text_content() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call",
               "params":{"name":"query_models","arguments":{"model_type":"nmos"}}}"#,
        )
        .unwrap();
        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("nfet"));
        assert!(result.get("isError").is_none());
    }

    #[test]
    fn unknown_tool_reports_a_tool_error() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call",
               "params":{"name":"simulate","arguments":{}}}"#,
        )
        .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn bad_arguments_are_invalid_params() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call",
               "params":{"name":"query_models","arguments":{}}}"#,
        )
        .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#,
        )
        .unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let response = handle_line(&toolbox(), "{not json").unwrap();
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
        assert_eq!(response.id, Value::Null);
    }

    #[test]
    fn notifications_get_no_response() {
        let response = handle_line(
            &toolbox(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        );
        assert!(response.is_none());
    }

    #[test]
    fn ping_answers_empty_object() {
        let response =
            handle_line(&toolbox(), r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(response.result.unwrap(), json!({}));
    }
}
