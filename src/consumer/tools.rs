//! 消费者工具
//!
//! 交互模式下唯一的队列消费者。watch 的取出与队列锁是同一个临界区，
//! 并发调用也不会把同一条记录交给两个调用者。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::Event;
use crate::queue::PromptQueue;
use crate::relay::Broadcaster;
use crate::types::{PromptRecord, PromptSummary};

/// watch 默认超时（秒）
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 300;
/// watch 最大超时（秒）
pub const MAX_WATCH_TIMEOUT_SECS: u64 = 600;
/// watch 兜底轮询间隔
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// watch 结果
///
/// 超时不是错误，只是另一种结束状态。两者互斥。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Delivered(PromptRecord),
    TimedOut { waited: Duration },
}

/// 消费者工具集
#[derive(Clone)]
pub struct ConsumerTools {
    queue: Arc<PromptQueue>,
    broadcaster: Arc<Broadcaster>,
}

impl ConsumerTools {
    pub fn new(queue: Arc<PromptQueue>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { queue, broadcaster }
    }

    /// 查看最旧的 prompt（不移除）
    ///
    /// 有结果时推送 `processing`。调用方处理完需要调用 `clear`。
    pub fn get_prompt(&self) -> Option<PromptRecord> {
        let record = self.queue.peek_oldest()?;
        tracing::debug!("🔍 get_prompt: id={}", record.id);
        self.broadcaster.broadcast(Event::Processing);
        Some(record)
    }

    /// 待处理 prompt 摘要
    pub fn list_pending(&self) -> Vec<PromptSummary> {
        self.queue.list_all().iter().map(PromptRecord::summary).collect()
    }

    /// 清空队列并推送 `done`，返回移除条数
    pub fn clear(&self) -> usize {
        let removed = self.queue.clear();
        tracing::info!("🧹 Queue cleared: removed={}", removed);
        self.broadcaster.broadcast(Event::Done);
        removed
    }

    /// 阻塞等待下一条 prompt
    ///
    /// 入队通知提前唤醒，`WATCH_POLL_INTERVAL` 兜底；截止时间一到立即返回超时。
    pub async fn watch(&self, timeout: Duration) -> WatchOutcome {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            let notified = self.queue.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.queue.pop_oldest() {
                tracing::info!(
                    "👀 watch delivered: id={}, waited={:?}",
                    record.id,
                    started.elapsed()
                );
                self.broadcaster.broadcast(Event::Processing);
                return WatchOutcome::Delivered(record);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("⏰ watch timed out after {:?}", timeout);
                return WatchOutcome::TimedOut { waited: timeout };
            }

            let wait = (deadline - now).min(WATCH_POLL_INTERVAL);
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    /// 计算 watch 超时：缺省 300 秒，上限 600 秒，负数按 0 处理
    pub fn watch_timeout(requested_secs: Option<f64>) -> Duration {
        let secs = requested_secs
            .filter(|s| s.is_finite())
            .unwrap_or(DEFAULT_WATCH_TIMEOUT_SECS as f64)
            .clamp(0.0, MAX_WATCH_TIMEOUT_SECS as f64);
        Duration::from_secs_f64(secs)
    }
}

/// 带来源信息的 prompt 文本
pub fn format_prompt(record: &PromptRecord) -> String {
    let mut out = format!("Prompt from {}\n", record.source_path);
    if !record.source_url.is_empty() {
        out.push_str(&format!("URL: {}\n", record.source_url));
    }
    out.push_str(&format!("Received: {}\n", record.received_at.to_rfc3339()));
    out.push_str(&format!("ID: {}\n\n", record.id));
    out.push_str(&record.prompt);
    out
}

/// 待处理列表文本
pub fn format_pending(pending: &[PromptSummary]) -> String {
    if pending.is_empty() {
        return NO_PENDING.to_string();
    }

    let mut out = format!("{} pending prompt(s):\n", pending.len());
    for (i, summary) in pending.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({} chars, received {})\n",
            i + 1,
            summary.source_path,
            summary.length,
            summary.received_at.to_rfc3339()
        ));
    }
    out
}

/// 超时文本
pub fn format_timeout(waited: Duration) -> String {
    format!("No prompt received within {} seconds.", waited.as_secs_f64())
}

/// 队列为空时的文本
pub const NO_PENDING: &str = "No pending prompts.";
