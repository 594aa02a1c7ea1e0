// ==========================================
// 实时生产看板 - API 层
// ==========================================
// 职责: 请求级业务接口, 供 HTTP 路由调用
// 说明: 本层不依赖传输框架
// ==========================================

pub mod dashboard_api;
pub mod error;
pub mod machine_api;

// 重导出核心类型
pub use dashboard_api::{DashboardApi, JobQueueItem, ProductionLogView};
pub use error::{ApiError, ApiResult};
pub use machine_api::{MachineAction, MachineApi, MachineRename};
