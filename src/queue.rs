//! Prompt 队列
//!
//! 进程内唯一的共享可变状态。所有操作都在同一把锁内完成，
//! 因此 `pop_oldest` 天然原子：同一条记录只会交给一个调用者。

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::types::{PromptRecord, DEFAULT_SOURCE_PATH};

/// FIFO Prompt 队列
pub struct PromptQueue {
    entries: Mutex<VecDeque<PromptRecord>>,
    /// 入队通知（watch 用来提前唤醒）
    arrivals: Notify,
}

impl PromptQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            arrivals: Notify::new(),
        }
    }

    /// 入队
    ///
    /// 空 prompt 返回 `Error::Validation`，队列不变。
    /// `source_path` 缺省或为空时取 `/`。
    pub fn enqueue(
        &self,
        prompt: impl Into<String>,
        source_url: Option<String>,
        source_path: Option<String>,
    ) -> Result<PromptRecord> {
        let prompt = prompt.into();
        if prompt.is_empty() {
            return Err(Error::Validation("prompt must be a non-empty string".to_string()));
        }

        let record = PromptRecord {
            id: uuid::Uuid::new_v4().to_string(),
            prompt,
            source_url: source_url.unwrap_or_default(),
            source_path: source_path
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string()),
            received_at: Utc::now(),
        };

        let pending = {
            let mut entries = self.entries.lock();
            entries.push_back(record.clone());
            entries.len()
        };
        self.arrivals.notify_waiters();

        tracing::debug!("📥 Prompt queued: id={}, pending={}", record.id, pending);
        Ok(record)
    }

    /// 查看最旧的记录（不移除）
    pub fn peek_oldest(&self) -> Option<PromptRecord> {
        self.entries.lock().front().cloned()
    }

    /// 取出最旧的记录
    pub fn pop_oldest(&self) -> Option<PromptRecord> {
        self.entries.lock().pop_front()
    }

    /// 当前队列快照（按入队顺序）
    pub fn list_all(&self) -> Vec<PromptRecord> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// 清空队列，返回移除的条数
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// 等待下一次入队
    ///
    /// 返回的 future 需要先 `enable()` 再检查队列，否则检查与等待之间的入队会丢失唤醒。
    pub fn notified(&self) -> Notified<'_> {
        self.arrivals.notified()
    }
}

impl Default for PromptQueue {
    fn default() -> Self {
        Self::new()
    }
}
