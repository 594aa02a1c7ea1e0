// ==========================================
// 实时生产看板 - 内存工单来源
// ==========================================
// 用途:
// - 未配置 ERP 时的默认来源 (空列表, 系统照常运行)
// - 测试中模拟外部系统, 并记录状态回写请求
// ==========================================

use super::WorkOrderSource;
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::ExternalWorkOrder;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryWorkOrderSource {
    work_orders: Mutex<Vec<ExternalWorkOrder>>,
    status_requests: Mutex<Vec<(String, WorkOrderStatus)>>,
}

impl InMemoryWorkOrderSource {
    pub fn new(work_orders: Vec<ExternalWorkOrder>) -> Self {
        Self {
            work_orders: Mutex::new(work_orders),
            status_requests: Mutex::new(Vec::new()),
        }
    }

    /// 替换当前工单列表
    pub fn replace(&self, work_orders: Vec<ExternalWorkOrder>) {
        if let Ok(mut guard) = self.work_orders.lock() {
            *guard = work_orders;
        }
    }

    /// 已收到的状态回写请求 (按到达顺序)
    pub fn status_requests(&self) -> Vec<(String, WorkOrderStatus)> {
        self.status_requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkOrderSource for InMemoryWorkOrderSource {
    async fn list_actionable_work_orders(&self) -> Vec<ExternalWorkOrder> {
        self.work_orders
            .lock()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|wo| wo.status != WorkOrderStatus::Completed)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn set_work_order_status(&self, work_order_id: &str, status: WorkOrderStatus) {
        if let Ok(mut requests) = self.status_requests.lock() {
            requests.push((work_order_id.to_string(), status));
        }
        // 同步本地副本, 模拟外部系统状态推进
        if let Ok(mut orders) = self.work_orders.lock() {
            if let Some(wo) = orders.iter_mut().find(|wo| wo.id == work_order_id) {
                wo.status = status;
            }
        }
    }
}
