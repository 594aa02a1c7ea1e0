// ==========================================
// 实时生产看板 - WebSocket 订阅端点
// ==========================================
// 连接建立: 注册订阅者 → 先发送一次当前快照 → 转发推送中心消息
// 连接关闭: 退订; 转发失败同样视为断开
// ==========================================

use crate::app::state::AppState;
use crate::engine::notifier::{DashboardMessage, Subscription};
use crate::engine::projection::load_snapshot;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

pub async fn ws_dashboard(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let Subscription { id, mut receiver } = state.hub.subscribe();
    let (mut sender, mut incoming) = socket.split();

    match load_snapshot(&state.store) {
        Ok(snapshot) => {
            if let Ok(text) = DashboardMessage::Snapshot(snapshot).to_json() {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    state.hub.unsubscribe(id);
                    return;
                }
            }
        }
        Err(e) => tracing::warn!(subscriber_id = id, "初始快照生成失败: {}", e),
    }

    let mut forward = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("推送消息序列化失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // 客户端消息只用于保活, 内容忽略
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }

    state.hub.unsubscribe(id);
    tracing::debug!(subscriber_id = id, "WebSocket 连接关闭");
}
