// ==========================================
// 实时生产看板 - 核心库
// ==========================================
// 技术栈: axum + tokio + Rust + SQLite
// 系统定位: 多厂区机台生产状态实时看板
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分派/状态机/计米/告警/推送
pub mod engine;

// 外部工单来源 - ERPNext
pub mod source;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP/WebSocket 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AlertLevel, ErpSyncStatus, MachineStatus, WorkOrderStatus};

// 领域实体
pub use domain::{AlertEvent, AssignmentRecord, ExternalWorkOrder, Machine, ProductionLogEntry};

// 引擎
pub use engine::{
    AlertEngine, AssignmentEngine, MachineStateMachine, NotificationHub, ProductionScheduler,
    ProgressSimulator,
};

// API
pub use api::{DashboardApi, MachineApi};

// ==========================================
// 版本信息
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "实时生产看板";
