// ==========================================
// 实时生产看板 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod alert;
pub mod machine;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use alert::AlertEvent;
pub use machine::Machine;
pub use types::{AlertLevel, ErpSyncStatus, MachineStatus, WorkOrderStatus};
pub use work_order::{
    AssignmentRecord, ExternalWorkOrder, MalformedWorkOrder, ProductionLogEntry, RawWorkOrder,
};
