//! prompt-relay - 浏览器 → Agent 的 prompt 中转
//!
//! 浏览器页面把用户写的 prompt 提交到本机 HTTP 端口，relay 放进内存队列，
//! 由外部 Agent 进程取走处理；队列状态通过 SSE 实时推回浏览器。
//!
//! # 核心功能
//!
//! - **队列**: 有序 FIFO，进程内唯一的共享状态
//! - **入口**: `GET /health`、`POST /prompt`、`GET /events`（SSE）
//! - **交互模式**: stdio MCP 工具面（get_prompt / list_pending / clear / watch）
//! - **Burst 模式**: 定时收集 + 合并 + 同步调用外部 Agent
//!
//! # Feature Flags
//!
//! - `mcp`: 交互模式消费者
//! - `batch`: Burst 模式批处理器
//!
//! # 架构
//!
//! 队列与广播器由 [`Relay`] 创建一次，以句柄形式交给 HTTP 入口和消费者。
//! 同一个队列只挂一种消费者。

pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod relay;
pub mod types;

#[cfg(feature = "mcp")]
pub mod consumer;

#[cfg(feature = "batch")]
pub mod batch;

// Re-exports
pub use config::{AgentCommand, BatchConfig, RelayConfig, DEFAULT_PORT};
pub use error::{Error, Result};
pub use protocol::{Event, StatusPush};
pub use queue::PromptQueue;
pub use relay::{Broadcaster, Relay};
pub use types::*;

#[cfg(feature = "mcp")]
pub use consumer::{ConsumerTools, McpServer, WatchOutcome};

#[cfg(feature = "batch")]
pub use batch::{BatchReport, BatchRunner};
