// ==========================================
// 实时生产看板 - 工单相关领域模型
// ==========================================
// 包含:
// - ExternalWorkOrder: 外部 ERP 工单 (只读)
// - RawWorkOrder: ERPNext 接口原始记录 (字段均可缺失)
// - AssignmentRecord: 工单 → 机台 分派记录
// - ProductionLogEntry: 产量流水 (只追加)
// ==========================================

use crate::domain::types::{ErpSyncStatus, WorkOrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

// ==========================================
// ExternalWorkOrder - 外部工单
// ==========================================
// 归属: 外部系统; 本系统只读, 仅请求状态流转
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkOrder {
    pub id: String,
    pub status: WorkOrderStatus,
    pub qty: i64,
    pub produced_qty: i64,
    pub preferred_machine_id: Option<String>, // 外部已指定的机台
    pub pipe_size: String,
    pub location: String,
}

impl ExternalWorkOrder {
    /// 外部系统是否已指定机台
    pub fn has_external_machine(&self) -> bool {
        self.preferred_machine_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

// ==========================================
// RawWorkOrder - ERPNext 原始记录
// ==========================================
// 对齐: ERPNext Work Order 资源字段 (custom_* 为扩展字段)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWorkOrder {
    pub name: Option<String>,
    pub status: Option<String>,
    pub qty: Option<f64>,
    pub produced_qty: Option<f64>,
    pub custom_machine_id: Option<JsonValue>,
    pub custom_pipe_size: Option<String>,
    pub custom_location: Option<String>,
}

/// 原始记录缺字段/取值非法
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedWorkOrder {
    #[error("工单缺少字段: {field}")]
    MissingField { field: &'static str },

    #[error("工单 {id} 状态无法识别: {status}")]
    UnknownStatus { id: String, status: String },

    #[error("工单 {id} 数量非法: {qty}")]
    InvalidQty { id: String, qty: f64 },
}

/// 单张工单数量上限
pub const MAX_WORK_ORDER_QTY: f64 = 1_000_000_000.0;

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, MalformedWorkOrder> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(MalformedWorkOrder::MissingField { field })
}

impl TryFrom<RawWorkOrder> for ExternalWorkOrder {
    type Error = MalformedWorkOrder;

    /// 缺少 id/状态/厂区/管径 或数量不在 (0, 上限] 的记录一律拒绝; 已产数量缺失按 0 处理
    fn try_from(raw: RawWorkOrder) -> Result<Self, Self::Error> {
        let id = non_empty(raw.name, "name")?;
        let status_raw = non_empty(raw.status, "status")?;
        let status = WorkOrderStatus::from_str(&status_raw).ok_or_else(|| {
            MalformedWorkOrder::UnknownStatus {
                id: id.clone(),
                status: status_raw.clone(),
            }
        })?;
        let location = non_empty(raw.custom_location, "custom_location")?;
        let pipe_size = non_empty(raw.custom_pipe_size, "custom_pipe_size")?;

        let qty = raw.qty.ok_or(MalformedWorkOrder::MissingField { field: "qty" })?;
        if !qty.is_finite() || qty <= 0.0 || qty > MAX_WORK_ORDER_QTY {
            return Err(MalformedWorkOrder::InvalidQty { id, qty });
        }
        let qty = qty.round() as i64;
        let produced_qty = raw
            .produced_qty
            .filter(|p| p.is_finite() && *p > 0.0)
            .map(|p| (p.round() as i64).min(qty))
            .unwrap_or(0);

        let preferred_machine_id = match raw.custom_machine_id {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(ExternalWorkOrder {
            id,
            status,
            qty,
            produced_qty,
            preferred_machine_id,
            pipe_size,
            location,
        })
    }
}

// ==========================================
// AssignmentRecord - 工单分派记录
// ==========================================
// 红线: 每个 work_order 至多一条记录 (表级 UNIQUE)
// 说明: machine_id 只是引用, 进度以 Machine 为准
// 生命周期: 首次分派时创建, 之后只更新不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub work_order: String,
    pub machine_id: i64,
    pub erp_status: ErpSyncStatus,
    pub comments: Option<String>,
    pub last_synced: DateTime<Utc>,
}

impl AssignmentRecord {
    pub fn new(work_order: impl Into<String>, machine_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            work_order: work_order.into(),
            machine_id,
            erp_status: ErpSyncStatus::Assigned,
            comments: None,
            last_synced: now,
        }
    }
}

// ==========================================
// ProductionLogEntry - 产量流水
// ==========================================
// 红线: 只追加, 不修改不删除; 每条固定记 1 个单位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLogEntry {
    pub log_id: String,
    pub machine_id: i64,
    pub work_order: String,
    pub pipe_size: Option<String>,
    pub produced_delta: i64,
    pub timestamp: DateTime<Utc>,
}

impl ProductionLogEntry {
    /// 记录一个单位的产出
    pub fn unit(
        machine_id: i64,
        work_order: impl Into<String>,
        pipe_size: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            machine_id,
            work_order: work_order.into(),
            pipe_size,
            produced_delta: 1,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: JsonValue) -> RawWorkOrder {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_raw_work_order_converts() {
        let wo = ExternalWorkOrder::try_from(raw(json!({
            "name": "WO1",
            "status": "Not Started",
            "qty": 100.0,
            "produced_qty": 0,
            "custom_pipe_size": "20",
            "custom_location": "X"
        })))
        .unwrap();

        assert_eq!(wo.id, "WO1");
        assert_eq!(wo.status, WorkOrderStatus::NotStarted);
        assert_eq!(wo.qty, 100);
        assert_eq!(wo.produced_qty, 0);
        assert!(!wo.has_external_machine());
    }

    #[test]
    fn test_missing_pipe_size_is_rejected() {
        let err = ExternalWorkOrder::try_from(raw(json!({
            "name": "WO2",
            "status": "Not Started",
            "qty": 10,
            "custom_location": "X"
        })))
        .unwrap_err();

        assert_eq!(
            err,
            MalformedWorkOrder::MissingField {
                field: "custom_pipe_size"
            }
        );
    }

    #[test]
    fn test_non_positive_qty_is_rejected() {
        let err = ExternalWorkOrder::try_from(raw(json!({
            "name": "WO3",
            "status": "Not Started",
            "qty": 0,
            "custom_pipe_size": "20",
            "custom_location": "X"
        })))
        .unwrap_err();

        assert!(matches!(err, MalformedWorkOrder::InvalidQty { .. }));
    }

    #[test]
    fn test_numeric_machine_reference_is_kept() {
        let wo = ExternalWorkOrder::try_from(raw(json!({
            "name": "WO4",
            "status": "In Process",
            "qty": 5,
            "produced_qty": 2,
            "custom_machine_id": 101,
            "custom_pipe_size": "32",
            "custom_location": "Baldeya"
        })))
        .unwrap();

        assert_eq!(wo.preferred_machine_id.as_deref(), Some("101"));
        assert!(wo.has_external_machine());
        assert_eq!(wo.produced_qty, 2);
    }

    #[test]
    fn test_oversized_qty_is_rejected() {
        let err = ExternalWorkOrder::try_from(raw(json!({
            "name": "WO-BIG",
            "status": "Not Started",
            "qty": 1e18,
            "custom_pipe_size": "20",
            "custom_location": "X"
        })))
        .unwrap_err();

        assert_eq!(
            err,
            MalformedWorkOrder::InvalidQty {
                id: "WO-BIG".to_string(),
                qty: 1e18
            }
        );
    }
}
