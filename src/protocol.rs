//! 协议定义
//!
//! - 浏览器侧：HTTP JSON（`/health`、`/prompt`）+ SSE 推送（`/events`）
//! - 消费者侧：stdio 上的 JSON-RPC 2.0（每条消息一行 JSON + '\n'）

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{RelayMode, RelayStatus};

/// SSE 事件名：连接建立确认
pub const EVENT_CONNECTED: &str = "connected";
/// SSE 事件名：状态推送
pub const EVENT_STATUS: &str = "status";

/// `POST /prompt` 请求体
///
/// `prompt` 保留原始 JSON 值，以便区分"缺失"与"不是字符串"。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitPrompt {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pathname: Option<String>,
}

impl SubmitPrompt {
    /// 取出非空字符串 prompt
    pub fn prompt_text(&self) -> Option<&str> {
        match &self.prompt {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// `POST /prompt` 成功响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAccepted {
    pub success: bool,
    pub id: String,
}

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `GET /health` 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub pending_prompts: usize,
    /// 当前 SSE 订阅数
    pub listeners: usize,
    /// 仅 Burst 模式上报
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RelayMode>,
}

/// 状态推送（SSE `status` 事件的 data）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPush {
    pub status: RelayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// 事件（内部使用，用于广播）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Received { id: String },
    Collecting,
    Processing,
    Done,
    Ready,
}

impl Event {
    /// 获取状态
    pub fn status(&self) -> RelayStatus {
        match self {
            Event::Received { .. } => RelayStatus::Received,
            Event::Collecting => RelayStatus::Collecting,
            Event::Processing => RelayStatus::Processing,
            Event::Done => RelayStatus::Done,
            Event::Ready => RelayStatus::Ready,
        }
    }

    /// 转换为 Push 消息
    pub fn to_push(&self) -> StatusPush {
        let id = match self {
            Event::Received { id } => Some(id.clone()),
            _ => None,
        };
        StatusPush {
            status: self.status(),
            id,
        }
    }
}

/// 一帧推送（SSE 事件名 + 已序列化的 data）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: &'static str,
    pub data: String,
}

/// JSON-RPC 请求 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

/// JSON-RPC 入站消息（请求或通知）
///
/// 没有 `id` 的是通知，不需要响应。
#[derive(Debug, Clone, Deserialize)]
pub struct RpcMessage {
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 错误对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    /// 解析失败时为 null
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC 错误码
pub mod rpc_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
}
