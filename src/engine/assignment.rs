// ==========================================
// 实时生产看板 - 工单分派引擎 (Assignment Engine)
// ==========================================
// 职责: 将未分派的外部工单匹配到空闲机台
// 红线: 引擎不拼 SQL; 每个跳过都输出 reason
// 规则 (按来源给出的工单顺序逐一处理):
// 1. 外部状态 In Process → 跳过 (外部已在生产)
// 2. 外部已指定机台 → 跳过
// 3. 本地已有分派记录 → 跳过 (幂等)
// 4. 候选 = 同厂区 + 未锁定 + 状态 ∈ {free, paused, stopped}
// 5. 无候选 → 跳过, 下个周期重试
// 6. 优先首个管径相同的候选, 否则取首个候选 (按 id 升序)
// 事务: 每个工单一个会话, 失败只回滚该工单
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::{MachineStatus, WorkOrderStatus};
use crate::domain::work_order::{AssignmentRecord, ExternalWorkOrder};
use crate::engine::notifier::NotificationHub;
use crate::engine::projection::load_snapshot;
use crate::repository::{
    AssignmentRepository, MachineRepository, ProductionStore, RepositoryError, RepositoryResult,
};
use crate::source::WorkOrderSource;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

// ==========================================
// Assignment - 一次分派结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub work_order: String,
    pub machine_id: i64,
    pub pipe_size: String,
    pub target_qty: i64,
    pub produced_qty: i64,
}

impl Assignment {
    fn new(work_order: &ExternalWorkOrder, machine: &Machine) -> Self {
        Self {
            work_order: work_order.id.clone(),
            machine_id: machine.id,
            pipe_size: work_order.pipe_size.clone(),
            target_qty: work_order.qty,
            produced_qty: work_order.produced_qty.min(work_order.qty),
        }
    }

    /// 初始化机台作业字段: 暂停 + 锁定
    pub fn apply_to(&self, machine: &mut Machine) {
        machine.work_order = Some(self.work_order.clone());
        machine.pipe_size = Some(self.pipe_size.clone());
        machine.target_qty = self.target_qty;
        machine.produced_qty = self.produced_qty;
        machine.status = MachineStatus::Paused;
        machine.is_locked = true;
        machine.last_tick_time = None;
    }

    pub fn record(&self, now: DateTime<Utc>) -> AssignmentRecord {
        AssignmentRecord::new(self.work_order.clone(), self.machine_id, now)
    }
}

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InProcess,
    Completed,
    ExternalMachine,
    AlreadyAssigned,
    NoCandidate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::InProcess => "外部状态 In Process",
            SkipReason::Completed => "外部状态 Completed",
            SkipReason::ExternalMachine => "外部已指定机台",
            SkipReason::AlreadyAssigned => "已有分派记录",
            SkipReason::NoCandidate => "无可用机台",
        };
        f.write_str(reason)
    }
}

/// 候选选择: 首个管径相同者, 否则首个候选
pub fn select_machine<'a>(work_order: &ExternalWorkOrder, machines: &'a [Machine]) -> Option<&'a Machine> {
    let mut candidates = machines
        .iter()
        .filter(|m| m.location == work_order.location && m.is_assignment_candidate());

    let first = candidates.next()?;
    if first.pipe_size.as_deref() == Some(work_order.pipe_size.as_str()) {
        return Some(first);
    }
    candidates
        .find(|m| m.pipe_size.as_deref() == Some(work_order.pipe_size.as_str()))
        .or(Some(first))
}

/// 单个工单的分派决策
pub fn plan_assignment(
    work_order: &ExternalWorkOrder,
    machines: &[Machine],
    already_assigned: bool,
) -> Result<Assignment, SkipReason> {
    match work_order.status {
        WorkOrderStatus::InProcess => return Err(SkipReason::InProcess),
        WorkOrderStatus::Completed => return Err(SkipReason::Completed),
        WorkOrderStatus::NotStarted => {}
    }
    if work_order.has_external_machine() {
        return Err(SkipReason::ExternalMachine);
    }
    if already_assigned || machines.iter().any(|m| m.work_order.as_deref() == Some(work_order.id.as_str())) {
        return Err(SkipReason::AlreadyAssigned);
    }

    select_machine(work_order, machines)
        .map(|machine| Assignment::new(work_order, machine))
        .ok_or(SkipReason::NoCandidate)
}

/// 纯内存分派: 依次处理并就地修改机台
///
/// `assigned` 为已有分派记录的工单号集合, 处理过程中同步追加
pub fn assign(
    work_orders: &[ExternalWorkOrder],
    machines: &mut [Machine],
    assigned: &mut HashSet<String>,
) -> Vec<Assignment> {
    let mut out = Vec::new();
    for work_order in work_orders {
        let already = assigned.contains(&work_order.id);
        let Ok(assignment) = plan_assignment(work_order, machines, already) else {
            continue;
        };
        if let Some(machine) = machines.iter_mut().find(|m| m.id == assignment.machine_id) {
            assignment.apply_to(machine);
        }
        assigned.insert(assignment.work_order.clone());
        out.push(assignment);
    }
    out
}

// ==========================================
// AssignmentEngine - 持久化分派
// ==========================================
pub struct AssignmentEngine {
    store: ProductionStore,
    source: Arc<dyn WorkOrderSource>,
    hub: Arc<NotificationHub>,
}

impl AssignmentEngine {
    pub fn new(store: ProductionStore, source: Arc<dyn WorkOrderSource>, hub: Arc<NotificationHub>) -> Self {
        Self { store, source, hub }
    }

    /// 一个周期: 拉取工单 → 逐单分派 → 有变更则推送快照
    pub async fn run_cycle(&self) -> RepositoryResult<Vec<Assignment>> {
        let work_orders = self.source.list_actionable_work_orders().await;
        if work_orders.is_empty() {
            tracing::debug!("本周期无可执行工单");
            return Ok(Vec::new());
        }

        let assignments = self.assign_work_orders(&work_orders, Utc::now());
        if !assignments.is_empty() {
            let snapshot = load_snapshot(&self.store)?;
            self.hub.publish_snapshot(snapshot);
        }
        Ok(assignments)
    }

    /// 逐单分派; 单个工单失败只记录日志
    pub fn assign_work_orders(&self, work_orders: &[ExternalWorkOrder], now: DateTime<Utc>) -> Vec<Assignment> {
        let mut out = Vec::new();
        for work_order in work_orders {
            match self.assign_one(work_order, now) {
                Ok(Ok(assignment)) => {
                    tracing::info!(
                        work_order = %assignment.work_order,
                        machine_id = assignment.machine_id,
                        location = %work_order.location,
                        pipe_size = %assignment.pipe_size,
                        "工单已分派"
                    );
                    out.push(assignment);
                }
                Ok(Err(reason)) => {
                    tracing::debug!(work_order = %work_order.id, %reason, "工单跳过");
                }
                Err(e) => {
                    tracing::warn!(work_order = %work_order.id, "工单分派失败, 已回滚: {}", e);
                }
            }
        }
        out
    }

    fn assign_one(
        &self,
        work_order: &ExternalWorkOrder,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Result<Assignment, SkipReason>> {
        self.store.session(|tx| {
            let machine_repo = MachineRepository::new(tx);
            let assignment_repo = AssignmentRepository::new(tx);

            let already_assigned = assignment_repo.exists(&work_order.id)?
                || machine_repo.find_by_work_order(&work_order.id)?.is_some();
            let candidates = machine_repo.list_assignment_candidates(&work_order.location)?;

            let assignment = match plan_assignment(work_order, &candidates, already_assigned) {
                Ok(a) => a,
                Err(reason) => return Ok(Err(reason)),
            };

            let mut machine = candidates
                .into_iter()
                .find(|m| m.id == assignment.machine_id)
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "Machine".to_string(),
                    id: assignment.machine_id.to_string(),
                })?;
            assignment.apply_to(&mut machine);
            machine_repo.update(&machine)?;
            assignment_repo.upsert(&assignment.record(now))?;

            Ok(Ok(assignment))
        })
    }
}
