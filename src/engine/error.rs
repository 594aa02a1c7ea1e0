// ==========================================
// 实时生产看板 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 周期任务内的错误只记录日志; 请求类操作向上转换为 ApiError
// ==========================================

use crate::domain::types::MachineStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("机台不存在: location={location}, id={id}")]
    MachineNotFound { location: String, id: i64 },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition {
        from: MachineStatus,
        to: MachineStatus,
    },

    #[error("机台未携带工单: machine_id={machine_id}")]
    MissingWorkOrder { machine_id: i64 },
}

pub type EngineResult<T> = Result<T, EngineError>;
