// ==========================================
// 实时生产看板 - 计米模拟器 (Progress Simulator)
// ==========================================
// 每个 tick 处理全部 running 机台:
// - 无速率或无工单 → 跳过
// - last_tick_time 为空 → 置为 now 并跳过 (首拍不推进)
// - 间隔 ≥ seconds_per_meter 且未达目标 → 推进恰好 1 个单位
//   (追加产量流水, 分派记录置 In Progress)
// - 达到目标 → 钳制为 target_qty, 转入 completed
// 红线: 无论延迟多久, 每个 tick 每台机台至多推进 1 个单位
// 事务: 一个 tick 的全部变更一次提交; 有推进才推送快照
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::{ErpSyncStatus, MachineStatus};
use crate::domain::work_order::ProductionLogEntry;
use crate::engine::error::EngineResult;
use crate::engine::notifier::NotificationHub;
use crate::engine::projection::load_snapshot;
use crate::engine::state_machine::{apply_transition, dispatch_effects, persist_transition, TransitionEffect};
use crate::repository::{AssignmentRepository, MachineRepository, ProductionLogRepository, ProductionStore};
use crate::source::WorkOrderSource;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 单台机台的单拍结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Skipped,
    Initialized,
    Waiting,
    Advanced { completed: bool },
}

/// 纯推进逻辑 (不含完成转换)
pub fn step_machine(machine: &mut Machine, now: DateTime<Utc>) -> Step {
    if machine.status != MachineStatus::Running || !machine.has_work_order() {
        return Step::Skipped;
    }
    let Some(spm) = machine.seconds_per_meter.filter(|&s| s > 0) else {
        return Step::Skipped;
    };
    let Some(last) = machine.last_tick_time else {
        machine.last_tick_time = Some(now);
        return Step::Initialized;
    };

    let elapsed = now.signed_duration_since(last).num_milliseconds();
    if elapsed < spm * 1000 || machine.produced_qty >= machine.target_qty {
        return Step::Waiting;
    }

    machine.produced_qty += 1;
    machine.last_tick_time = Some(now);
    if machine.produced_qty >= machine.target_qty {
        machine.produced_qty = machine.target_qty;
        Step::Advanced { completed: true }
    } else {
        Step::Advanced { completed: false }
    }
}

/// 一个 tick 的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub advanced: Vec<i64>,
    pub completed: Vec<i64>,
    pub initialized: Vec<i64>,
}

impl TickOutcome {
    pub fn has_progress(&self) -> bool {
        !self.advanced.is_empty()
    }
}

// ==========================================
// ProgressSimulator
// ==========================================
pub struct ProgressSimulator {
    store: ProductionStore,
    source: Arc<dyn WorkOrderSource>,
    hub: Arc<NotificationHub>,
}

impl ProgressSimulator {
    pub fn new(store: ProductionStore, source: Arc<dyn WorkOrderSource>, hub: Arc<NotificationHub>) -> Self {
        Self { store, source, hub }
    }

    /// 执行一拍 (时间由调用方给出)
    pub async fn tick(&self, now: DateTime<Utc>) -> EngineResult<TickOutcome> {
        let (outcome, effects) = self.store.session(|tx| -> EngineResult<_> {
            let machine_repo = MachineRepository::new(tx);
            let log_repo = ProductionLogRepository::new(tx);
            let assignment_repo = AssignmentRepository::new(tx);

            let mut outcome = TickOutcome::default();
            let mut effects: Vec<TransitionEffect> = Vec::new();

            for mut machine in machine_repo.list_by_status(MachineStatus::Running)? {
                match step_machine(&mut machine, now) {
                    Step::Skipped | Step::Waiting => {}
                    Step::Initialized => {
                        machine_repo.update(&machine)?;
                        outcome.initialized.push(machine.id);
                    }
                    Step::Advanced { completed } => {
                        let work_order = machine.work_order.clone().unwrap_or_default();
                        log_repo.append(&ProductionLogEntry::unit(
                            machine.id,
                            work_order.clone(),
                            machine.pipe_size.clone(),
                            now,
                        ))?;
                        assignment_repo.set_status(&work_order, ErpSyncStatus::InProgress, now)?;
                        outcome.advanced.push(machine.id);

                        if completed {
                            let effect = apply_transition(&mut machine, MachineStatus::Completed, now)?;
                            persist_transition(tx, &machine, &effect, now)?;
                            effects.push(effect);
                            outcome.completed.push(machine.id);
                            tracing::info!(
                                machine_id = machine.id,
                                work_order = %work_order,
                                produced_qty = machine.produced_qty,
                                "工单生产完成"
                            );
                        } else {
                            machine_repo.update(&machine)?;
                        }
                        tracing::debug!(
                            machine_id = machine.id,
                            produced_qty = machine.produced_qty,
                            target_qty = machine.target_qty,
                            "计米推进"
                        );
                    }
                }
            }

            Ok((outcome, effects))
        })?;

        dispatch_effects(self.source.as_ref(), &effects).await;

        if outcome.has_progress() {
            let snapshot = load_snapshot(&self.store)?;
            self.hub.publish_snapshot(snapshot);
        }
        Ok(outcome)
    }
}
