//! prompt-relay - 浏览器 prompt 中转服务
//!
//! 负责：
//! - 本机 HTTP 入口（/health、/prompt、/events）
//! - 交互模式：stdio MCP 工具面
//! - Burst 模式：定时合并 prompt 并调用外部 Agent

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prompt_relay::{AgentCommand, Error, McpServer, Relay, RelayConfig, RelayMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Relay browser prompts to a local agent.
#[derive(Debug, Parser)]
#[command(name = "prompt-relay", version, about)]
struct Cli {
    /// HTTP port (localhost only)
    #[arg(short, long, env = "PROMPT_RELAY_PORT")]
    port: Option<u16>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Batch prompts and invoke the agent command instead of serving MCP on stdio
    #[arg(long)]
    burst: bool,

    /// Agent command line used in burst mode (default: "claude -p")
    #[arg(long)]
    agent: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout 留给 MCP，日志只写 stderr
    let directive = if cli.verbose {
        "prompt_relay=debug"
    } else {
        "prompt_relay=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    tracing::info!("🚀 prompt-relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RelayConfig::from_env().context("读取环境配置失败")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(agent) = cli.agent.as_deref() {
        config.batch.agent = AgentCommand::parse(agent)?;
    }
    if cli.burst {
        config.mode = RelayMode::Burst;
    }

    let relay = Arc::new(Relay::new(config));

    let listener = match relay.bind().await {
        Ok(listener) => listener,
        Err(Error::PortInUse(port)) => {
            tracing::error!("❌ Port {} is already in use, exiting", port);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let server = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.serve(listener, shutdown_signal()).await })
    };

    match relay.config().mode {
        RelayMode::Interactive => {
            let mcp = McpServer::new(relay.consumer());
            tokio::select! {
                result = mcp.serve(tokio::io::stdin(), tokio::io::stdout()) => {
                    result?;
                    tracing::info!("stdin closed");
                }
                result = server => {
                    result.context("server task panicked")??;
                }
                // SSE 长连接会拖住优雅关闭，这里直接退出
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        RelayMode::Burst => {
            let runner = relay.batch_runner();
            tokio::select! {
                _ = runner.run() => {}
                result = server => {
                    result.context("server task panicked")??;
                }
                // SSE 长连接会拖住优雅关闭，这里直接退出
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }

    tracing::info!("👋 prompt-relay exiting");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到中断信号，准备退出...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_port_reads_relay_env_var() {
        let command = Cli::command();
        let port = command
            .get_arguments()
            .find(|arg| arg.get_id() == "port")
            .unwrap();
        assert_eq!(port.get_env(), Some(std::ffi::OsStr::new("PROMPT_RELAY_PORT")));
    }

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from(["prompt-relay", "-p", "5000", "--burst", "--agent", "codex exec"])
            .unwrap();
        assert_eq!(cli.port, Some(5000));
        assert!(cli.burst);
        assert_eq!(cli.agent.as_deref(), Some("codex exec"));
    }
}
