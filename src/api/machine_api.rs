// ==========================================
// 实时生产看板 - 机台控制 API
// ==========================================
// 职责: 人工控制机台 (启动/暂停/停机/重命名/释放)
// 边界检查 (状态机本身不校验每条边):
// - start:   需携带工单, 当前 ∈ {paused, stopped}
// - pause:   需携带工单, 当前 ∈ {running, paused, stopped}
// - stop:    需携带工单, 当前 ∈ {running, paused, stopped}
// - release: 当前 = completed → free
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::machine::Machine;
use crate::domain::types::MachineStatus;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::state_machine::MachineStateMachine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_MACHINE_NAME_LEN: usize = 64;

/// 机台定位 (请求体)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MachineAction {
    pub location: String,
    pub machine_id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MachineRename {
    pub location: String,
    pub machine_id: i64,
    pub new_name: String,
}

fn transition_error(machine: &Machine, target: MachineStatus) -> EngineError {
    EngineError::InvalidStateTransition {
        from: machine.status,
        to: target,
    }
}

fn check_start(machine: &Machine, target: MachineStatus) -> EngineResult<()> {
    if !machine.has_work_order() {
        return Err(EngineError::MissingWorkOrder {
            machine_id: machine.id,
        });
    }
    match machine.status {
        MachineStatus::Paused | MachineStatus::Stopped => Ok(()),
        MachineStatus::Free | MachineStatus::Running | MachineStatus::Completed => {
            Err(transition_error(machine, target))
        }
    }
}

fn check_hold(machine: &Machine, target: MachineStatus) -> EngineResult<()> {
    match machine.status {
        MachineStatus::Running | MachineStatus::Paused | MachineStatus::Stopped
            if machine.has_work_order() =>
        {
            Ok(())
        }
        _ => Err(transition_error(machine, target)),
    }
}

fn check_release(machine: &Machine, target: MachineStatus) -> EngineResult<()> {
    match machine.status {
        MachineStatus::Completed => Ok(()),
        _ => Err(transition_error(machine, target)),
    }
}

// ==========================================
// MachineApi
// ==========================================
pub struct MachineApi {
    state_machine: Arc<MachineStateMachine>,
}

impl MachineApi {
    pub fn new(state_machine: Arc<MachineStateMachine>) -> Self {
        Self { state_machine }
    }

    fn validate_location(location: &str) -> ApiResult<&str> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidInput("location不能为空".to_string()));
        }
        Ok(trimmed)
    }

    pub async fn start(&self, action: &MachineAction) -> ApiResult<Machine> {
        let location = Self::validate_location(&action.location)?;
        Ok(self
            .state_machine
            .transition_with(location, action.machine_id, MachineStatus::Running, check_start)
            .await?)
    }

    pub async fn pause(&self, action: &MachineAction) -> ApiResult<Machine> {
        let location = Self::validate_location(&action.location)?;
        Ok(self
            .state_machine
            .transition_with(location, action.machine_id, MachineStatus::Paused, check_hold)
            .await?)
    }

    pub async fn stop(&self, action: &MachineAction) -> ApiResult<Machine> {
        let location = Self::validate_location(&action.location)?;
        Ok(self
            .state_machine
            .transition_with(location, action.machine_id, MachineStatus::Stopped, check_hold)
            .await?)
    }

    pub async fn release(&self, action: &MachineAction) -> ApiResult<Machine> {
        let location = Self::validate_location(&action.location)?;
        Ok(self
            .state_machine
            .transition_with(location, action.machine_id, MachineStatus::Free, check_release)
            .await?)
    }

    pub fn rename(&self, request: &MachineRename) -> ApiResult<Machine> {
        let location = Self::validate_location(&request.location)?;
        let name = request.new_name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("new_name不能为空".to_string()));
        }
        if name.chars().count() > MAX_MACHINE_NAME_LEN {
            return Err(ApiError::InvalidInput(format!(
                "new_name长度不能超过{}",
                MAX_MACHINE_NAME_LEN
            )));
        }
        Ok(self.state_machine.rename(location, request.machine_id, name)?)
    }
}
