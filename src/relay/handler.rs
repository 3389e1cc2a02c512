//! HTTP 请求处理器
//!
//! 处理浏览器侧的健康检查、prompt 提交与状态订阅

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use super::broadcaster::{Broadcaster, Subscription};
use crate::protocol::{
    ErrorBody, Event, Frame, Health, SubmitAccepted, SubmitPrompt, EVENT_CONNECTED,
};
use crate::queue::PromptQueue;
use crate::types::RelayMode;

/// SSE 保活间隔
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// 处理器共享状态
///
/// 只持有队列与广播器的句柄，自身无状态。
#[derive(Clone)]
pub struct RelayState {
    pub queue: Arc<PromptQueue>,
    pub broadcaster: Arc<Broadcaster>,
    pub mode: RelayMode,
}

/// `GET /health`
pub async fn health(State(state): State<RelayState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        pending_prompts: state.queue.count(),
        listeners: state.broadcaster.connection_count(),
        mode: match state.mode {
            RelayMode::Burst => Some(RelayMode::Burst),
            RelayMode::Interactive => None,
        },
    })
}

/// `POST /prompt`
///
/// 请求体自行解析，保证所有错误都是 400 + `{error}`。
pub async fn submit_prompt(State(state): State<RelayState>, body: Bytes) -> Response {
    let submission: SubmitPrompt = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("解析请求失败: {}", e);
            return bad_request(format!("Invalid JSON body: {}", e));
        }
    };

    let Some(prompt) = submission.prompt_text() else {
        tracing::debug!("Rejected submission without prompt text");
        return bad_request("Missing or invalid 'prompt' field".to_string());
    };

    let record = match state
        .queue
        .enqueue(prompt, submission.url.clone(), submission.pathname.clone())
    {
        Ok(r) => r,
        Err(e) => return bad_request(e.to_string()),
    };

    tracing::info!(
        "📝 Prompt received: id={}, path={}, chars={}",
        record.id,
        record.source_path,
        record.prompt.chars().count()
    );

    state.broadcaster.broadcast(Event::Received {
        id: record.id.clone(),
    });

    Json(SubmitAccepted {
        success: true,
        id: record.id,
    })
    .into_response()
}

/// `GET /events`
///
/// 先发 `connected`，之后转发所有广播；客户端断开时流被丢弃，订阅随之注销。
pub async fn events(
    State(state): State<RelayState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (subscription, rx) = Subscription::open(state.broadcaster.clone());
    tracing::debug!("📥 SSE 连接: conn_id={}", subscription.conn_id());

    let connected = Frame {
        event: EVENT_CONNECTED,
        data: serde_json::json!({ "status": EVENT_CONNECTED }).to_string(),
    };

    let stream = tokio_stream::once(connected)
        .chain(ReceiverStream::new(rx))
        .map(move |frame| {
            let _ = &subscription;
            Ok::<_, Infallible>(SseEvent::default().event(frame.event).data(frame.data))
        });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })).into_response()
}
