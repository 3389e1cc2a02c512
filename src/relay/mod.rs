//! Relay 模块 - 浏览器侧入口 + 状态推送
//!
//! - 接收浏览器提交的 prompt 并写入队列
//! - 健康检查（存活 + 待处理数量）
//! - SSE 推送队列状态变化

mod broadcaster;
mod handler;
mod server;

pub use broadcaster::{Broadcaster, ConnId, FrameSender, Subscription, SUBSCRIBER_CAPACITY};
pub use handler::{RelayState, KEEP_ALIVE_INTERVAL};
pub use server::{router, Relay};
