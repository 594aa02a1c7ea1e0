// ==========================================
// 实时生产看板 - 看板查询 API
// ==========================================
// 职责: 只读查询
// - 看板快照 (按厂区分组)
// - 工单队列 (外部可执行工单, 排除 Completed)
// - 最近产量流水 (新 → 旧)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::ProductionLogEntry;
use crate::engine::projection::{load_snapshot, DashboardSnapshot};
use crate::repository::{ProductionLogRepository, ProductionStore};
use crate::source::WorkOrderSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const MAX_PRODUCTION_LOG_LIMIT: usize = 1000;

/// 工单队列条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobQueueItem {
    pub id: String,
    pub pipe_size: String,
    pub qty: i64,
    pub produced_qty: i64,
    pub location: String,
    pub status: WorkOrderStatus,
    pub machine_id: Option<String>,
}

/// 产量流水条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionLogView {
    pub machine_id: i64,
    pub work_order: String,
    pub pipe_size: Option<String>,
    pub produced_qty: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<ProductionLogEntry> for ProductionLogView {
    fn from(entry: ProductionLogEntry) -> Self {
        Self {
            machine_id: entry.machine_id,
            work_order: entry.work_order,
            pipe_size: entry.pipe_size,
            produced_qty: entry.produced_delta,
            timestamp: entry.timestamp,
        }
    }
}

// ==========================================
// DashboardApi
// ==========================================
pub struct DashboardApi {
    store: ProductionStore,
    source: Arc<dyn WorkOrderSource>,
    default_log_limit: usize,
}

impl DashboardApi {
    pub fn new(store: ProductionStore, source: Arc<dyn WorkOrderSource>, default_log_limit: usize) -> Self {
        Self {
            store,
            source,
            default_log_limit: default_log_limit.clamp(1, MAX_PRODUCTION_LOG_LIMIT),
        }
    }

    /// 看板快照
    pub fn dashboard(&self) -> ApiResult<DashboardSnapshot> {
        Ok(load_snapshot(&self.store)?)
    }

    /// 工单队列 (外部系统不可达时为空)
    pub async fn job_queue(&self) -> ApiResult<Vec<JobQueueItem>> {
        let work_orders = self.source.list_actionable_work_orders().await;
        Ok(work_orders
            .into_iter()
            .filter(|wo| wo.status != WorkOrderStatus::Completed)
            .map(|wo| JobQueueItem {
                id: wo.id,
                pipe_size: wo.pipe_size,
                qty: wo.qty,
                produced_qty: wo.produced_qty,
                location: wo.location,
                status: wo.status,
                machine_id: wo.preferred_machine_id,
            })
            .collect())
    }

    /// 最近产量流水
    pub fn production_logs(&self, limit: Option<usize>) -> ApiResult<Vec<ProductionLogView>> {
        let limit = match limit {
            None => self.default_log_limit,
            Some(0) => return Err(ApiError::InvalidInput("limit必须大于0".to_string())),
            Some(n) => n.min(MAX_PRODUCTION_LOG_LIMIT),
        };

        let entries = self
            .store
            .read(|conn| ProductionLogRepository::new(conn).list_recent(limit))?;
        Ok(entries.into_iter().map(ProductionLogView::from).collect())
    }
}
