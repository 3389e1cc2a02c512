//! 运行配置

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::RelayMode;

/// 默认端口
pub const DEFAULT_PORT: u16 = 4242;

/// Relay 配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 监听地址（只绑定本机）
    pub host: IpAddr,
    /// 监听端口
    pub port: u16,
    /// 消费者模式
    pub mode: RelayMode,
    /// Burst 模式配置
    pub batch: BatchConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            mode: RelayMode::Interactive,
            batch: BatchConfig::default(),
        }
    }
}

impl RelayConfig {
    /// 从环境变量创建配置，缺省项使用默认值
    ///
    /// - `PROMPT_RELAY_PORT`
    /// - `PROMPT_RELAY_AGENT`（命令行，按空白切分）
    /// - `PROMPT_RELAY_BATCH_WINDOW_SECS`
    /// - `PROMPT_RELAY_POLL_INTERVAL_SECS`（至少 1 秒）
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 按给定的查找函数读取同一组变量
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup("PROMPT_RELAY_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid PROMPT_RELAY_PORT: {}", port)))?;
        }

        if let Some(agent) = lookup("PROMPT_RELAY_AGENT") {
            config.batch.agent = AgentCommand::parse(&agent)?;
        }

        if let Some(secs) = lookup("PROMPT_RELAY_BATCH_WINDOW_SECS") {
            config.batch.window = parse_secs("PROMPT_RELAY_BATCH_WINDOW_SECS", &secs)?;
        }

        if let Some(secs) = lookup("PROMPT_RELAY_POLL_INTERVAL_SECS") {
            let interval = parse_secs("PROMPT_RELAY_POLL_INTERVAL_SECS", &secs)?;
            // tokio interval 不接受零周期
            if interval.is_zero() {
                return Err(Error::Config(
                    "PROMPT_RELAY_POLL_INTERVAL_SECS must be at least 1".to_string(),
                ));
            }
            config.batch.poll_interval = interval;
        }

        Ok(config)
    }

    /// 监听地址
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::Config(format!("invalid {}: {}", name, value)))
}

/// 轮询间隔下限
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Burst 模式配置
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// 队列轮询间隔
    pub poll_interval: Duration,
    /// 收集窗口
    pub window: Duration,
    /// 外部 Agent 命令
    pub agent: AgentCommand,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            window: Duration::from_secs(30),
            agent: AgentCommand::default(),
        }
    }
}

/// 外部 Agent 命令
///
/// 合并后的文档作为最后一个参数追加。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl AgentCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 解析命令行字符串（按空白切分，不支持引号）
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("agent command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Default for AgentCommand {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: vec!["-p".to_string()],
        }
    }
}
