// ==========================================
// 实时生产看板 - 引擎层
// ==========================================
// 职责: 分派、状态机、计米模拟、阈值告警、快照投影、通知分发
// 红线: Engine 不拼 SQL, 数据访问一律经由 Repository
// 红线: 周期任务出错只记录日志, 不终止进程
// ==========================================

pub mod alert;
pub mod assignment;
pub mod error;
pub mod fleet;
pub mod notifier;
pub mod projection;
pub mod scheduler;
pub mod simulator;
pub mod state_machine;

// 重导出核心引擎
pub use alert::{AlertEngine, AlertHistory};
pub use assignment::{assign, select_machine, Assignment, AssignmentEngine, SkipReason};
pub use error::{EngineError, EngineResult};
pub use fleet::seed_fleet_if_empty;
pub use notifier::{DashboardMessage, NotificationHub, Subscription};
pub use projection::{
    load_snapshot, project, DashboardSnapshot, JobView, LocationSnapshot, MachineView, NextJobView,
};
pub use scheduler::{ProductionScheduler, SchedulerHandles};
pub use simulator::{ProgressSimulator, TickOutcome};
pub use state_machine::{apply_transition, MachineStateMachine, TransitionEffect};
