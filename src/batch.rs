//! Burst 模式批处理器
//!
//! 定时检查队列，发现 prompt 后先等一个收集窗口，把窗口内到达的所有 prompt
//! 合并成一份文档，同步调用一次外部 Agent。
//!
//! 每批最多投递一次：无论 Agent 成功与否都会清空队列，失败不重试。

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::process::Command;

use crate::config::{AgentCommand, BatchConfig, MIN_POLL_INTERVAL};
use crate::error::{Error, Result};
use crate::protocol::Event;
use crate::queue::PromptQueue;
use crate::relay::Broadcaster;
use crate::types::PromptRecord;

/// 一批的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// 本批合并的 prompt 数
    pub prompts: usize,
    /// 清空时移除的条数
    pub cleared: usize,
    /// Agent 是否成功退出
    pub agent_succeeded: bool,
}

/// 批处理器
pub struct BatchRunner {
    queue: Arc<PromptQueue>,
    broadcaster: Arc<Broadcaster>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        queue: Arc<PromptQueue>,
        broadcaster: Arc<Broadcaster>,
        mut config: BatchConfig,
    ) -> Self {
        config.poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        Self {
            queue,
            broadcaster,
            config,
        }
    }

    /// 运行主循环（不会因单批失败而退出）
    pub async fn run(&self) {
        tracing::info!(
            "🔁 Burst mode: poll={:?}, window={:?}, agent={}",
            self.config.poll_interval,
            self.config.window,
            self.config.agent.program
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.queue.count() == 0 {
                continue;
            }

            let report = self.process_batch().await;
            tracing::info!(
                "📦 Batch finished: prompts={}, cleared={}, agent_ok={}",
                report.prompts,
                report.cleared,
                report.agent_succeeded
            );
            ticker.reset();
        }
    }

    /// 处理一批：收集窗口 → 合并 → 调用 Agent → 清空
    pub async fn process_batch(&self) -> BatchReport {
        self.broadcaster.broadcast(Event::Collecting);
        tracing::info!("⏳ Collecting prompts for {:?}", self.config.window);
        tokio::time::sleep(self.config.window).await;

        let records = self.queue.list_all();
        if records.is_empty() {
            self.broadcaster.broadcast(Event::Ready);
            return BatchReport {
                prompts: 0,
                cleared: 0,
                agent_succeeded: false,
            };
        }

        let document = combine_prompts(&records);
        self.broadcaster.broadcast(Event::Processing);

        let agent_succeeded = match invoke_agent(&self.config.agent, &document).await {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::warn!("⚠️ Agent exited with {}", status);
                false
            }
            Err(e) => {
                tracing::warn!("⚠️ {}", e);
                false
            }
        };

        let cleared = self.queue.clear();
        self.broadcaster.broadcast(Event::Done);
        self.broadcaster.broadcast(Event::Ready);

        BatchReport {
            prompts: records.len(),
            cleared,
            agent_succeeded,
        }
    }
}

/// 合并多条 prompt（按入队顺序，每条标注来源路径）
pub fn combine_prompts(records: &[PromptRecord]) -> String {
    let mut document = format!(
        "You have {} prompt(s) queued from the browser. Handle each in order:\n",
        records.len()
    );
    for (i, record) in records.iter().enumerate() {
        document.push_str(&format!(
            "\n## Prompt {} (from {})\n\n{}\n",
            i + 1,
            record.source_path,
            record.prompt
        ));
    }
    document
}

/// 同步调用外部 Agent，继承当前进程的 stdin/stdout/stderr
async fn invoke_agent(agent: &AgentCommand, document: &str) -> Result<ExitStatus> {
    tracing::info!("🤖 Invoking agent: {} {:?}", agent.program, agent.args);

    Command::new(&agent.program)
        .args(&agent.args)
        .arg(document)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| Error::AgentInvocation(format!("failed to start '{}': {}", agent.program, e)))
}
