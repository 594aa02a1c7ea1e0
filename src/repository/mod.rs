// ==========================================
// 实时生产看板 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: 仓储借用会话内的连接, 事务边界由 ProductionStore::session 决定
// ==========================================

pub mod assignment_repo;
pub mod error;
pub mod machine_repo;
pub mod production_log_repo;
pub mod store;

// 重导出核心仓储
pub use assignment_repo::AssignmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use machine_repo::MachineRepository;
pub use production_log_repo::ProductionLogRepository;
pub use store::ProductionStore;
