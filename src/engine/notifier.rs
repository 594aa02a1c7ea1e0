// ==========================================
// 实时生产看板 - 通知分发 (Notification Hub)
// ==========================================
// 职责: 维护在线订阅者集合, 向每个订阅者推送快照与告警
// 红线: 单个订阅者发送失败 → 静默移除该订阅者, 不影响其他订阅者与生产方
// 说明: 每个订阅者一条有界 mpsc 通道; 满载视同发送失败
// ==========================================

use crate::domain::alert::AlertEvent;
use crate::engine::projection::DashboardSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

// ==========================================
// 推送消息
// ==========================================
// 快照: {"locations": [...]}
// 告警: {"alert": message, "machine_id": id, "level": n}
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DashboardMessage {
    Snapshot(DashboardSnapshot),
    Alert(AlertEvent),
}

impl DashboardMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// 订阅句柄: id 用于主动退订
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<DashboardMessage>,
}

// ==========================================
// NotificationHub
// ==========================================
#[derive(Debug)]
pub struct NotificationHub {
    subscribers: Mutex<BTreeMap<u64, mpsc::Sender<DashboardMessage>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// 注册新订阅者
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.subscribers.lock() {
            Ok(mut subs) => {
                subs.insert(id, tx);
            }
            Err(e) => tracing::error!("订阅者集合锁获取失败: {}", e),
        }
        tracing::debug!(subscriber_id = id, "订阅者已接入");
        Subscription { id, receiver: rx }
    }

    /// 主动退订 (连接关闭时调用)
    pub fn unsubscribe(&self, id: u64) {
        if let Ok(mut subs) = self.subscribers.lock() {
            if subs.remove(&id).is_some() {
                tracing::debug!(subscriber_id = id, "订阅者已退订");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }

    /// 推送给全部订阅者, 返回成功送达数量
    pub fn publish(&self, message: DashboardMessage) -> usize {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!("订阅者集合锁获取失败: {}", e);
                return 0;
            }
        };

        let mut dropped = Vec::new();
        for (id, tx) in subs.iter() {
            if tx.try_send(message.clone()).is_err() {
                dropped.push(*id);
            }
        }
        for id in &dropped {
            subs.remove(id);
            tracing::debug!(subscriber_id = id, "订阅者发送失败, 已移除");
        }

        subs.len()
    }

    pub fn publish_snapshot(&self, snapshot: DashboardSnapshot) -> usize {
        self.publish(DashboardMessage::Snapshot(snapshot))
    }

    pub fn publish_alert(&self, alert: AlertEvent) -> usize {
        self.publish(DashboardMessage::Alert(alert))
    }
}
