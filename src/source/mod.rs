// ==========================================
// 实时生产看板 - 外部工单来源
// ==========================================
// 职责: 定义工单来源 trait, 屏蔽 ERP 传输细节
// 红线: 两个方法在 trait 边界上都不返回错误
// - 拉取失败 → 空列表 (本周期无事可做)
// - 状态回写失败 → 记录日志, 不影响调用方事务
// ==========================================

pub mod erpnext;
pub mod memory;

use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::ExternalWorkOrder;
use async_trait::async_trait;

pub use erpnext::ErpNextClient;
pub use memory::InMemoryWorkOrderSource;

// ==========================================
// WorkOrderSource Trait
// ==========================================
// 实现者: ErpNextClient (REST), InMemoryWorkOrderSource (未配置 ERP / 测试)
#[async_trait]
pub trait WorkOrderSource: Send + Sync {
    /// 拉取可执行工单 (状态 ∈ {Not Started, In Process})
    async fn list_actionable_work_orders(&self) -> Vec<ExternalWorkOrder>;

    /// 请求外部系统变更工单状态 (尽力而为)
    async fn set_work_order_status(&self, work_order_id: &str, status: WorkOrderStatus);
}
