//! 数据类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 默认来源路径
pub const DEFAULT_SOURCE_PATH: &str = "/";

/// Prompt 记录
///
/// 入队时创建，之后只会被整条移除，不会被修改。
/// 调用方拿到的永远是副本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// 进程内唯一 ID（入队时生成）
    pub id: String,
    /// Prompt 文本（非空）
    pub prompt: String,
    /// 来源页面完整 URL（可能为空）
    pub source_url: String,
    /// 来源页面路径（默认 `/`）
    pub source_path: String,
    /// 入队时间
    pub received_at: DateTime<Utc>,
}

impl PromptRecord {
    /// 生成摘要（list_pending 使用）
    pub fn summary(&self) -> PromptSummary {
        PromptSummary {
            id: self.id.clone(),
            source_path: self.source_path.clone(),
            length: self.prompt.chars().count(),
            received_at: self.received_at,
        }
    }
}

/// Prompt 摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSummary {
    pub id: String,
    pub source_path: String,
    /// 内容长度（字符数）
    pub length: usize,
    pub received_at: DateTime<Utc>,
}

/// 推送给浏览器的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    /// 新 prompt 已入队
    Received,
    /// Burst 模式：开始收集窗口
    Collecting,
    /// 消费者开始处理
    Processing,
    /// 消费者处理完成
    Done,
    /// 消费者空闲
    Ready,
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayStatus::Received => write!(f, "received"),
            RelayStatus::Collecting => write!(f, "collecting"),
            RelayStatus::Processing => write!(f, "processing"),
            RelayStatus::Done => write!(f, "done"),
            RelayStatus::Ready => write!(f, "ready"),
        }
    }
}

/// 运行模式
///
/// 同一个队列只会有一种消费者：交互式工具面或 Burst 批处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    #[default]
    Interactive,
    Burst,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Interactive => write!(f, "interactive"),
            RelayMode::Burst => write!(f, "burst"),
        }
    }
}
