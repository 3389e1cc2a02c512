//! MCP 服务器
//!
//! stdio 上的 JSON-RPC 2.0（每行一条消息），对外只暴露四个工具。
//! 每个请求在独立任务中处理，阻塞中的 watch 不会挡住 ping / list_pending。

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::tools::{
    format_pending, format_prompt, format_timeout, ConsumerTools, WatchOutcome, NO_PENDING,
};
use crate::protocol::{rpc_code, RequestId, RpcMessage, RpcResponse};

/// 协议版本（客户端未指定时使用）
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// 服务器名称
pub const SERVER_NAME: &str = "prompt-relay";

/// 工具名称
pub mod tool_name {
    pub const GET_PROMPT: &str = "get_prompt";
    pub const LIST_PENDING: &str = "list_pending";
    pub const CLEAR: &str = "clear";
    pub const WATCH: &str = "watch";
}

/// MCP 服务器
pub struct McpServer {
    tools: ConsumerTools,
}

impl McpServer {
    pub fn new(tools: ConsumerTools) -> Arc<Self> {
        Arc::new(Self { tools })
    }

    /// 在给定的读写端上运行，直到读端 EOF
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);

        // 响应统一经由写任务输出，保证一行一条
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let write_handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if writer.write_all(msg.as_bytes()).await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let mut in_flight = JoinSet::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let message = match parse_message(trimmed) {
                        Ok(m) => m,
                        Err(response) => {
                            send(&tx, &response);
                            continue;
                        }
                    };

                    let server = self.clone();
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        if let Some(response) = server.handle(message).await {
                            send(&tx, &response);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("读取失败: {}", e);
                    break;
                }
            }

            // 回收已完成的任务
            while in_flight.try_join_next().is_some() {}
        }

        // 对端已关闭，没有人再等结果
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
        drop(tx);
        let _ = write_handle.await;

        tracing::debug!("📤 MCP 连接关闭");
        Ok(())
    }

    /// 处理一条消息，通知返回 None
    pub async fn handle(&self, message: RpcMessage) -> Option<RpcResponse> {
        let Some(id) = message.id else {
            tracing::debug!("🔔 Notification: {}", message.method);
            return None;
        };

        let params = message.params.unwrap_or(Value::Null);
        let response = match message.method.as_str() {
            "initialize" => RpcResponse::ok(Some(id), self.initialize(&params)),
            "ping" => RpcResponse::ok(Some(id), json!({})),
            "tools/list" => RpcResponse::ok(Some(id), json!({ "tools": tool_definitions() })),
            "tools/call" => self.handle_tool_call(id, &params).await,
            other => {
                tracing::debug!("Unknown method: {}", other);
                RpcResponse::err(
                    Some(id),
                    rpc_code::METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                )
            }
        };
        Some(response)
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        tracing::info!("🤝 MCP initialize: protocolVersion={}", version);

        json!({
            "protocolVersion": version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    async fn handle_tool_call(&self, id: RequestId, params: &Value) -> RpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return RpcResponse::err(
                Some(id),
                rpc_code::INVALID_PARAMS,
                "tools/call requires a 'name'",
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        tracing::debug!("🔧 tools/call: {}", name);

        let result = match name {
            tool_name::GET_PROMPT => match self.tools.get_prompt() {
                Some(record) => text_result(format_prompt(&record), false),
                None => text_result(NO_PENDING.to_string(), false),
            },
            tool_name::LIST_PENDING => {
                text_result(format_pending(&self.tools.list_pending()), false)
            }
            tool_name::CLEAR => {
                let removed = self.tools.clear();
                text_result(format!("Cleared {} prompt(s).", removed), false)
            }
            tool_name::WATCH => {
                let requested = arguments.get("timeout_seconds").and_then(Value::as_f64);
                let timeout = ConsumerTools::watch_timeout(requested);
                match self.tools.watch(timeout).await {
                    WatchOutcome::Delivered(record) => text_result(format_prompt(&record), false),
                    WatchOutcome::TimedOut { waited } => text_result(format_timeout(waited), false),
                }
            }
            other => text_result(format!("Unknown tool: {}", other), true),
        };

        RpcResponse::ok(Some(id), result)
    }
}

/// 解析一行输入；失败时给出可直接回写的错误响应
fn parse_message(line: &str) -> std::result::Result<RpcMessage, RpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        tracing::warn!("解析请求失败: {}", e);
        RpcResponse::err(None, rpc_code::PARSE_ERROR, format!("Parse error: {}", e))
    })?;

    let id = value
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value::<RequestId>(v).ok());

    serde_json::from_value(value).map_err(|e| {
        RpcResponse::err(id, rpc_code::INVALID_REQUEST, format!("Invalid request: {}", e))
    })
}

fn send(tx: &mpsc::UnboundedSender<String>, response: &RpcResponse) {
    match serde_json::to_string(response) {
        Ok(json) => {
            let _ = tx.send(format!("{}\n", json));
        }
        Err(e) => tracing::error!("Failed to serialize response: {}", e),
    }
}

fn text_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

/// 工具定义（tools/list）
pub fn tool_definitions() -> Value {
    let no_args = json!({ "type": "object", "properties": {} });
    json!([
        {
            "name": tool_name::GET_PROMPT,
            "description": "Return the oldest pending browser prompt with its source page, without removing it. Call clear when done.",
            "inputSchema": no_args.clone(),
        },
        {
            "name": tool_name::LIST_PENDING,
            "description": "List every pending prompt: source path, length and time received.",
            "inputSchema": no_args.clone(),
        },
        {
            "name": tool_name::CLEAR,
            "description": "Remove all pending prompts and mark the work as done.",
            "inputSchema": no_args,
        },
        {
            "name": tool_name::WATCH,
            "description": "Block until a prompt arrives, then remove and return it. Returns a timeout message if none arrives in time.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "timeout_seconds": {
                        "type": "number",
                        "description": "Seconds to wait (default 300, max 600)",
                    },
                },
            },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PromptQueue;
    use crate::relay::Broadcaster;

    fn server() -> (Arc<McpServer>, Arc<PromptQueue>) {
        let queue = Arc::new(PromptQueue::new());
        let tools = ConsumerTools::new(queue.clone(), Broadcaster::new());
        (McpServer::new(tools), queue)
    }

    fn request(id: i64, method: &str, params: Value) -> RpcMessage {
        RpcMessage {
            id: Some(RequestId::Number(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn text_of(response: &RpcResponse) -> String {
        response.result.as_ref().unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let (server, _) = server();
        let message = RpcMessage {
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(server.handle(message).await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let (server, _) = server();
        let response = server
            .handle(request(1, "initialize", json!({ "protocolVersion": "2025-03-26" })))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list_has_four_tools() {
        let (server, _) = server();
        let response = server.handle(request(2, "tools/list", json!({}))).await.unwrap();

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["get_prompt", "list_pending", "clear", "watch"]);
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let (server, _) = server();

        let response = server.handle(request(3, "resources/list", json!({}))).await.unwrap();
        assert_eq!(response.error.unwrap().code, rpc_code::METHOD_NOT_FOUND);

        let response = server
            .handle(request(4, "tools/call", json!({ "name": "explode" })))
            .await
            .unwrap();
        assert_eq!(response.result.as_ref().unwrap()["isError"], true);

        let response = server.handle(request(5, "tools/call", json!({}))).await.unwrap();
        assert_eq!(response.error.unwrap().code, rpc_code::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_get_then_clear_scenario() {
        let (server, queue) = server();
        queue
            .enqueue("add a footer", None, Some("/design".to_string()))
            .unwrap();

        let response = server
            .handle(request(6, "tools/call", json!({ "name": "get_prompt" })))
            .await
            .unwrap();
        let text = text_of(&response);
        assert!(text.contains("add a footer"));
        assert!(text.contains("/design"));
        assert_eq!(queue.count(), 1);

        let response = server
            .handle(request(7, "tools/call", json!({ "name": "clear" })))
            .await
            .unwrap();
        assert_eq!(text_of(&response), "Cleared 1 prompt(s).");
        assert_eq!(queue.count(), 0);

        let response = server
            .handle(request(8, "tools/call", json!({ "name": "get_prompt" })))
            .await
            .unwrap();
        assert_eq!(text_of(&response), NO_PENDING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_tool_timeout_text() {
        let (server, _) = server();
        let response = server
            .handle(request(
                9,
                "tools/call",
                json!({ "name": "watch", "arguments": { "timeout_seconds": 2 } }),
            ))
            .await
            .unwrap();
        assert_eq!(text_of(&response), "No prompt received within 2 seconds.");
    }

    #[test]
    fn test_parse_message_errors() {
        let err = parse_message("{not json").unwrap_err();
        assert!(err.id.is_none());
        assert_eq!(err.error.unwrap().code, rpc_code::PARSE_ERROR);

        let err = parse_message(r#"{"jsonrpc":"2.0","id":7}"#).unwrap_err();
        assert_eq!(err.id, Some(RequestId::Number(7)));
        assert_eq!(err.error.unwrap().code, rpc_code::INVALID_REQUEST);
    }
}
