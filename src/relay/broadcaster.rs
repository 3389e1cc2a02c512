//! 事件广播器
//!
//! 维护 SSE 订阅列表，将状态推送给所有订阅者

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::protocol::{Event, Frame, EVENT_STATUS};

/// 连接 ID
pub type ConnId = u64;

/// 消息发送通道
pub type FrameSender = mpsc::Sender<Frame>;

/// 每个订阅者的通道容量
pub const SUBSCRIBER_CAPACITY: usize = 64;

/// 事件广播器
pub struct Broadcaster {
    /// 连接通道：ConnId → 发送通道
    senders: RwLock<HashMap<ConnId, FrameSender>>,
    /// 下一个连接 ID
    next_conn_id: RwLock<ConnId>,
}

impl Broadcaster {
    /// 创建新的广播器
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册订阅者，返回连接 ID
    pub fn subscribe(&self, sender: FrameSender) -> ConnId {
        let mut next_id = self.next_conn_id.write();
        let conn_id = *next_id;
        *next_id += 1;

        self.senders.write().insert(conn_id, sender);

        tracing::debug!("📡 Listener subscribed: conn_id={}", conn_id);
        conn_id
    }

    /// 注销订阅者（重复调用无副作用）
    pub fn unsubscribe(&self, conn_id: ConnId) {
        if self.senders.write().remove(&conn_id).is_some() {
            tracing::debug!("📡 Listener unsubscribed: conn_id={}", conn_id);
        }
    }

    /// 广播状态事件（非阻塞，fire-and-forget）
    pub fn broadcast(&self, event: Event) {
        let push = event.to_push();
        tracing::debug!("📤 status={}", push.status);

        let data = match serde_json::to_string(&push) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize event: {}", e);
                return;
            }
        };

        self.publish(EVENT_STATUS, data);
    }

    /// 推送任意事件给当前所有订阅者
    ///
    /// 通道满或已关闭的订阅者直接跳过，不影响调用方。
    pub fn publish(&self, event: &'static str, data: String) {
        let targets: Vec<(ConnId, FrameSender)> = {
            let senders = self.senders.read();
            senders.iter().map(|(id, s)| (*id, s.clone())).collect()
        };

        if targets.is_empty() {
            tracing::trace!("📡 No listeners: event={}", event);
            return;
        }

        tracing::debug!(
            "📡 Broadcasting: event={}, data={}, listeners={}",
            event,
            data,
            targets.len()
        );

        let frame = Frame { event, data };
        for (conn_id, sender) in targets {
            if let Err(e) = sender.try_send(frame.clone()) {
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        tracing::warn!("📡 Channel full, dropping frame: conn_id={}", conn_id);
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        tracing::debug!("📡 Channel closed: conn_id={}", conn_id);
                    }
                }
            }
        }
    }

    /// 获取当前订阅数
    pub fn connection_count(&self) -> usize {
        self.senders.read().len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            next_conn_id: RwLock::new(1),
        }
    }
}

/// 订阅句柄
///
/// Drop 时自动注销，连接断开后不会残留在订阅列表里。
pub struct Subscription {
    broadcaster: Arc<Broadcaster>,
    conn_id: ConnId,
}

impl Subscription {
    /// 注册新订阅，返回句柄与接收端
    pub fn open(broadcaster: Arc<Broadcaster>) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let conn_id = broadcaster.subscribe(tx);
        (
            Self {
                broadcaster,
                conn_id,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.conn_id);
    }
}
