//! 错误类型定义

use thiserror::Error;

/// 库错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 提交内容校验失败（prompt 缺失、为空或不是字符串）
    #[error("校验错误: {0}")]
    Validation(String),

    /// 监听端口已被占用
    #[error("端口 {0} 已被占用")]
    PortInUse(u16),

    /// 外部 Agent 命令启动失败
    #[error("Agent 调用失败: {0}")]
    AgentInvocation(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
