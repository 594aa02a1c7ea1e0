// ==========================================
// 实时生产看板 - 机台状态机 (Machine State Machine)
// ==========================================
// 流转: free → paused ⇄ running → completed
//       running → stopped, stopped → paused/running
// 副作用:
// - running:   锁定 + last_tick_time = now + 请求外部 In Process
// - completed: 解锁 + 分派记录 Completed + 请求外部 Completed
// - paused / stopped: 仅状态变更
// - free:      清空作业字段 (释放已完成机台)
// 红线: 外部请求在提交之后发出, 失败不回滚本地事务
// 红线: 每次转换都提交并推送快照
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::{ErpSyncStatus, MachineStatus, WorkOrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::notifier::NotificationHub;
use crate::engine::projection::load_snapshot;
use crate::repository::{AssignmentRepository, MachineRepository, ProductionStore};
use crate::source::WorkOrderSource;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::Arc;

/// 转换产生的外部副作用 (提交后执行)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionEffect {
    pub erp_request: Option<(String, WorkOrderStatus)>,
    pub record_status: Option<(String, ErpSyncStatus)>,
}

/// 纯转换: 修改机台字段, 返回待执行的副作用
///
/// 仅拒绝"无工单进入 running"; 其余前置条件由调用方保证
pub fn apply_transition(
    machine: &mut Machine,
    target: MachineStatus,
    now: DateTime<Utc>,
) -> EngineResult<TransitionEffect> {
    let mut effect = TransitionEffect::default();

    match target {
        MachineStatus::Running => {
            let work_order = machine
                .work_order
                .clone()
                .filter(|wo| !wo.is_empty())
                .ok_or(EngineError::MissingWorkOrder {
                    machine_id: machine.id,
                })?;
            machine.status = MachineStatus::Running;
            machine.is_locked = true;
            machine.last_tick_time = Some(now);
            effect.erp_request = Some((work_order, WorkOrderStatus::InProcess));
        }
        MachineStatus::Completed => {
            machine.status = MachineStatus::Completed;
            machine.is_locked = false;
            if let Some(work_order) = machine.work_order.clone() {
                effect.record_status = Some((work_order.clone(), ErpSyncStatus::Completed));
                effect.erp_request = Some((work_order, WorkOrderStatus::Completed));
            }
        }
        MachineStatus::Paused | MachineStatus::Stopped => {
            machine.status = target;
        }
        MachineStatus::Free => {
            machine.clear_job();
        }
    }

    Ok(effect)
}

/// 在当前会话内落库: 机台 + 分派记录
pub(crate) fn persist_transition(
    conn: &Connection,
    machine: &Machine,
    effect: &TransitionEffect,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    MachineRepository::new(conn).update(machine)?;
    if let Some((work_order, status)) = &effect.record_status {
        AssignmentRepository::new(conn).set_status(work_order, *status, now)?;
    }
    Ok(())
}

/// 提交后通知外部系统 (尽力而为)
pub(crate) async fn dispatch_effects(source: &dyn WorkOrderSource, effects: &[TransitionEffect]) {
    for effect in effects {
        if let Some((work_order, status)) = &effect.erp_request {
            source.set_work_order_status(work_order, *status).await;
        }
    }
}

// ==========================================
// MachineStateMachine
// ==========================================
pub struct MachineStateMachine {
    store: ProductionStore,
    source: Arc<dyn WorkOrderSource>,
    hub: Arc<NotificationHub>,
}

impl MachineStateMachine {
    pub fn new(store: ProductionStore, source: Arc<dyn WorkOrderSource>, hub: Arc<NotificationHub>) -> Self {
        Self { store, source, hub }
    }

    /// 按 (厂区, id) 执行转换, 返回转换后的机台
    pub async fn transition(
        &self,
        location: &str,
        machine_id: i64,
        target: MachineStatus,
    ) -> EngineResult<Machine> {
        self.transition_with(location, machine_id, target, |_, _| Ok(()))
            .await
    }

    /// 同上, 前置条件在同一会话内对当前机台检查
    pub async fn transition_with(
        &self,
        location: &str,
        machine_id: i64,
        target: MachineStatus,
        precondition: fn(&Machine, MachineStatus) -> EngineResult<()>,
    ) -> EngineResult<Machine> {
        let now = Utc::now();
        let (machine, effect, from) = self.store.session(|tx| -> EngineResult<_> {
            let mut machine = MachineRepository::new(tx)
                .find(location, machine_id)?
                .ok_or_else(|| EngineError::MachineNotFound {
                    location: location.to_string(),
                    id: machine_id,
                })?;
            let from = machine.status;
            precondition(&machine, target)?;
            let effect = apply_transition(&mut machine, target, now)?;
            persist_transition(tx, &machine, &effect, now)?;
            Ok((machine, effect, from))
        })?;

        tracing::info!(
            machine_id,
            location,
            from = %from,
            to = %target,
            "机台状态已变更"
        );

        dispatch_effects(self.source.as_ref(), std::slice::from_ref(&effect)).await;
        self.publish_snapshot();
        Ok(machine)
    }

    /// 修改名称 (不改变状态)
    pub fn rename(&self, location: &str, machine_id: i64, new_name: &str) -> EngineResult<Machine> {
        let machine = self.store.session(|tx| -> EngineResult<_> {
            let repo = MachineRepository::new(tx);
            let mut machine = repo
                .find(location, machine_id)?
                .ok_or_else(|| EngineError::MachineNotFound {
                    location: location.to_string(),
                    id: machine_id,
                })?;
            machine.name = new_name.to_string();
            repo.update(&machine)?;
            Ok(machine)
        })?;

        tracing::info!(machine_id, location, name = new_name, "机台已重命名");
        self.publish_snapshot();
        Ok(machine)
    }

    fn publish_snapshot(&self) {
        match load_snapshot(&self.store) {
            Ok(snapshot) => {
                self.hub.publish_snapshot(snapshot);
            }
            Err(e) => tracing::warn!("快照生成失败: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned_machine() -> Machine {
        let mut m = Machine::new(1, "X", "Machine 1");
        m.work_order = Some("WO1".to_string());
        m.pipe_size = Some("20".to_string());
        m.target_qty = 100;
        m.seconds_per_meter = Some(20);
        m.status = MachineStatus::Paused;
        m.is_locked = true;
        m
    }

    #[test]
    fn test_running_locks_and_stamps_tick_time() {
        let mut m = assigned_machine();
        m.is_locked = false;
        let now = Utc::now();

        let effect = apply_transition(&mut m, MachineStatus::Running, now).unwrap();

        assert_eq!(m.status, MachineStatus::Running);
        assert!(m.is_locked);
        assert_eq!(m.last_tick_time, Some(now));
        assert_eq!(
            effect.erp_request,
            Some(("WO1".to_string(), WorkOrderStatus::InProcess))
        );
        assert!(effect.record_status.is_none());
    }

    #[test]
    fn test_running_without_work_order_is_rejected() {
        let mut m = Machine::new(1, "X", "Machine 1");
        let err = apply_transition(&mut m, MachineStatus::Running, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::MissingWorkOrder { machine_id: 1 }));
        assert_eq!(m.status, MachineStatus::Free);
    }

    #[test]
    fn test_completed_unlocks_and_closes_record() {
        let mut m = assigned_machine();
        m.status = MachineStatus::Running;

        let effect = apply_transition(&mut m, MachineStatus::Completed, Utc::now()).unwrap();

        assert_eq!(m.status, MachineStatus::Completed);
        assert!(!m.is_locked);
        assert_eq!(
            effect.record_status,
            Some(("WO1".to_string(), ErpSyncStatus::Completed))
        );
        assert_eq!(
            effect.erp_request,
            Some(("WO1".to_string(), WorkOrderStatus::Completed))
        );
    }

    #[test]
    fn test_pause_and_stop_only_change_status() {
        let mut m = assigned_machine();
        m.status = MachineStatus::Running;

        let effect = apply_transition(&mut m, MachineStatus::Stopped, Utc::now()).unwrap();
        assert_eq!(m.status, MachineStatus::Stopped);
        assert!(m.is_locked);
        assert_eq!(effect, TransitionEffect::default());

        apply_transition(&mut m, MachineStatus::Paused, Utc::now()).unwrap();
        assert_eq!(m.status, MachineStatus::Paused);
    }

    #[test]
    fn test_free_clears_job() {
        let mut m = assigned_machine();
        m.status = MachineStatus::Completed;
        m.produced_qty = 100;

        apply_transition(&mut m, MachineStatus::Free, Utc::now()).unwrap();
        assert_eq!(m.status, MachineStatus::Free);
        assert!(!m.has_work_order());
        assert!(!m.is_locked);
    }
}
