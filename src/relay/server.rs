//! Relay 服务器
//!
//! 本机 HTTP 服务：接收 prompt、提供健康检查、推送状态

use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::broadcaster::Broadcaster;
use super::handler::{self, RelayState};
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::queue::PromptQueue;

/// 构建路由
///
/// 所有来源都允许跨域：信任边界是"只监听本机"，不是 Origin。
pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handler::health))
        .route("/prompt", post(handler::submit_prompt))
        .route("/events", get(handler::events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Relay 服务
///
/// 队列与广播器在这里创建一次，然后以句柄的形式交给各组件。
pub struct Relay {
    config: RelayConfig,
    queue: Arc<PromptQueue>,
    broadcaster: Arc<Broadcaster>,
}

impl Relay {
    /// 创建 Relay
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            queue: Arc::new(PromptQueue::new()),
            broadcaster: Broadcaster::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn queue(&self) -> Arc<PromptQueue> {
        self.queue.clone()
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        self.broadcaster.clone()
    }

    /// 处理器共享状态
    pub fn state(&self) -> RelayState {
        RelayState {
            queue: self.queue.clone(),
            broadcaster: self.broadcaster.clone(),
            mode: self.config.mode,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state())
    }

    /// 绑定监听端口
    ///
    /// 端口被占用时返回 `Error::PortInUse`。
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr();
        match TcpListener::bind(addr).await {
            Ok(listener) => Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                Err(Error::PortInUse(self.config.port))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// 在已绑定的监听器上运行，直到 `shutdown` 完成
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!("🚀 Relay listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("🧹 Relay stopped");
        Ok(())
    }

    /// 交互模式的消费者工具面
    #[cfg(feature = "mcp")]
    pub fn consumer(&self) -> crate::consumer::ConsumerTools {
        crate::consumer::ConsumerTools::new(self.queue.clone(), self.broadcaster.clone())
    }

    /// Burst 模式的批处理器
    #[cfg(feature = "batch")]
    pub fn batch_runner(&self) -> crate::batch::BatchRunner {
        crate::batch::BatchRunner::new(
            self.queue.clone(),
            self.broadcaster.clone(),
            self.config.batch.clone(),
        )
    }
}
