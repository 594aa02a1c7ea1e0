// ==========================================
// 实时生产看板 - 快照投影 (Snapshot Projection)
// ==========================================
// 职责: 机台 + 分派记录 → 按厂区分组的看板快照
// 红线: 纯函数, 只读; 是推送通道的唯一快照来源
// 规则:
// - 厂区顺序 = 机台枚举顺序中首次出现的顺序
// - 每个厂区至多一个"下一作业": {free, stopped} 中首个携带工单的机台
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::{ErpSyncStatus, MachineStatus};
use crate::domain::work_order::AssignmentRecord;
use crate::repository::{AssignmentRepository, MachineRepository, ProductionStore, RepositoryResult};
use serde::Serialize;
use std::collections::HashMap;

// ==========================================
// 快照视图
// ==========================================

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardSnapshot {
    pub locations: Vec<LocationSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSnapshot {
    pub name: String,
    pub machines: Vec<MachineView>,
    pub next_job: Option<NextJobView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineView {
    pub id: i64,
    pub name: String,
    pub status: MachineStatus,
    pub is_locked: bool,
    pub job: Option<JobView>,
}

/// 机台当前作业 (仅携带工单时存在)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub work_order: String,
    pub pipe_size: Option<String>,
    pub target_qty: i64,
    pub produced_qty: i64,
    pub remaining_qty: i64,
    pub remaining_time: Option<i64>, // 秒; 未设速率时为 null
    pub progress_percent: f64,
    pub erp_status: Option<ErpSyncStatus>,
    pub erp_comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextJobView {
    pub machine_id: i64,
    pub work_order: String,
    pub pipe_size: Option<String>,
    pub target_qty: i64,
    pub produced_qty: i64,
    pub remaining_time: Option<i64>,
}

fn job_view(machine: &Machine, record: Option<&AssignmentRecord>) -> Option<JobView> {
    let work_order = machine.work_order.clone().filter(|wo| !wo.is_empty())?;
    Some(JobView {
        work_order,
        pipe_size: machine.pipe_size.clone(),
        target_qty: machine.target_qty,
        produced_qty: machine.produced_qty,
        remaining_qty: machine.remaining_qty(),
        remaining_time: machine.remaining_time_secs(),
        progress_percent: machine.progress_percent(),
        erp_status: record.map(|r| r.erp_status),
        erp_comments: record.and_then(|r| r.comments.clone()),
    })
}

fn is_next_job_candidate(machine: &Machine) -> bool {
    matches!(machine.status, MachineStatus::Free | MachineStatus::Stopped) && machine.has_work_order()
}

/// 投影: 机台按给定顺序枚举
pub fn project(machines: &[Machine], records: &[AssignmentRecord]) -> DashboardSnapshot {
    let records_by_wo: HashMap<&str, &AssignmentRecord> = records
        .iter()
        .map(|r| (r.work_order.as_str(), r))
        .collect();

    let mut locations: Vec<LocationSnapshot> = Vec::new();
    for machine in machines {
        let index = match locations.iter().position(|l| l.name == machine.location) {
            Some(i) => i,
            None => {
                locations.push(LocationSnapshot {
                    name: machine.location.clone(),
                    machines: Vec::new(),
                    next_job: None,
                });
                locations.len() - 1
            }
        };
        let location = &mut locations[index];

        let record = machine
            .work_order
            .as_deref()
            .and_then(|wo| records_by_wo.get(wo).copied());

        if location.next_job.is_none() && is_next_job_candidate(machine) {
            if let Some(work_order) = machine.work_order.clone() {
                location.next_job = Some(NextJobView {
                    machine_id: machine.id,
                    work_order,
                    pipe_size: machine.pipe_size.clone(),
                    target_qty: machine.target_qty,
                    produced_qty: machine.produced_qty,
                    remaining_time: machine.remaining_time_secs(),
                });
            }
        }

        location.machines.push(MachineView {
            id: machine.id,
            name: machine.name.clone(),
            status: machine.status,
            is_locked: machine.is_locked,
            job: job_view(machine, record),
        });
    }

    DashboardSnapshot { locations }
}

/// 从存储读取并投影 (单次只读会话)
pub fn load_snapshot(store: &ProductionStore) -> RepositoryResult<DashboardSnapshot> {
    store.read(|conn| {
        let machines = MachineRepository::new(conn).list_all()?;
        let records = AssignmentRepository::new(conn).list_all()?;
        Ok(project(&machines, &records))
    })
}
