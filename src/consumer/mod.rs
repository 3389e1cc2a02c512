//! Consumer 模块 - 交互模式下的队列消费者
//!
//! 对外部 Agent 暴露四个工具：get_prompt / list_pending / clear / watch

mod mcp;
mod tools;

pub use mcp::{tool_definitions, tool_name, McpServer, PROTOCOL_VERSION, SERVER_NAME};
pub use tools::{
    format_pending, format_prompt, format_timeout, ConsumerTools, WatchOutcome,
    DEFAULT_WATCH_TIMEOUT_SECS, MAX_WATCH_TIMEOUT_SECS, NO_PENDING, WATCH_POLL_INTERVAL,
};
