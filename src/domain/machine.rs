// ==========================================
// 实时生产看板 - 机台领域模型
// ==========================================
// 红线: produced_qty ≤ target_qty
// 红线: status = running 时 is_locked 必为 true
// 生命周期: 初始化时按厂区播种, 此后不删除, 跨工单复用
// ==========================================

use crate::domain::types::MachineStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Machine - 生产机台
// ==========================================
// 对齐: machine 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    // ===== 标识 =====
    pub id: i64,          // 机台ID (稳定唯一)
    pub location: String, // 所属厂区

    // ===== 可变字段 =====
    pub name: String,
    pub status: MachineStatus,
    pub is_locked: bool,
    pub work_order: Option<String>, // 当前外部工单号

    // ===== 作业参数 =====
    pub pipe_size: Option<String>,
    pub target_qty: i64,
    pub produced_qty: i64,
    pub seconds_per_meter: Option<i64>, // 每生产 1 单位所需秒数
    pub last_tick_time: Option<DateTime<Utc>>,
}

impl Machine {
    /// 创建一台空闲机台
    pub fn new(id: i64, location: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            location: location.into(),
            name: name.into(),
            status: MachineStatus::Free,
            is_locked: false,
            work_order: None,
            pipe_size: None,
            target_qty: 0,
            produced_qty: 0,
            seconds_per_meter: None,
            last_tick_time: None,
        }
    }

    /// 是否携带工单
    pub fn has_work_order(&self) -> bool {
        self.work_order.as_deref().is_some_and(|wo| !wo.is_empty())
    }

    /// 是否可作为分派候选 (未锁定 + 状态 ∈ {free, paused, stopped})
    pub fn is_assignment_candidate(&self) -> bool {
        !self.is_locked && self.status.is_assignable()
    }

    /// 剩余数量 (无目标时为 0)
    pub fn remaining_qty(&self) -> i64 {
        if self.target_qty > 0 {
            (self.target_qty - self.produced_qty).max(0)
        } else {
            0
        }
    }

    /// 剩余时间 (秒), 未设置速率或溢出时为 None
    pub fn remaining_time_secs(&self) -> Option<i64> {
        self.seconds_per_meter
            .filter(|&spm| spm > 0)
            .and_then(|spm| self.remaining_qty().checked_mul(spm))
    }

    /// 完成百分比 (无目标时为 0)
    pub fn progress_percent(&self) -> f64 {
        if self.target_qty > 0 {
            self.produced_qty as f64 / self.target_qty as f64 * 100.0
        } else {
            0.0
        }
    }

    /// 清空作业字段, 回到空闲
    pub fn clear_job(&mut self) {
        self.status = MachineStatus::Free;
        self.is_locked = false;
        self.work_order = None;
        self.target_qty = 0;
        self.produced_qty = 0;
        self.last_tick_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_machine(target: i64, produced: i64, spm: Option<i64>) -> Machine {
        let mut m = Machine::new(1, "Modan", "Machine 1");
        m.work_order = Some("WO-1".to_string());
        m.target_qty = target;
        m.produced_qty = produced;
        m.seconds_per_meter = spm;
        m
    }

    #[test]
    fn test_remaining_and_progress() {
        let m = make_machine(100, 25, Some(20));
        assert_eq!(m.remaining_qty(), 75);
        assert_eq!(m.remaining_time_secs(), Some(1500));
        assert!((m.progress_percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_target_reports_zero_progress() {
        let m = make_machine(0, 0, None);
        assert_eq!(m.remaining_qty(), 0);
        assert_eq!(m.remaining_time_secs(), None);
        assert_eq!(m.progress_percent(), 0.0);
    }

    #[test]
    fn test_candidate_requires_unlocked_and_assignable() {
        let mut m = Machine::new(2, "Modan", "Machine 2");
        assert!(m.is_assignment_candidate());

        m.is_locked = true;
        assert!(!m.is_assignment_candidate());

        m.is_locked = false;
        m.status = MachineStatus::Running;
        assert!(!m.is_assignment_candidate());
    }

    #[test]
    fn test_clear_job_returns_to_free() {
        let mut m = make_machine(100, 100, Some(20));
        m.status = MachineStatus::Completed;
        m.clear_job();

        assert_eq!(m.status, MachineStatus::Free);
        assert!(!m.has_work_order());
        assert_eq!(m.target_qty, 0);
        // 速率属于机台本身, 不随工单清空
        assert_eq!(m.seconds_per_meter, Some(20));
    }

    #[test]
    fn test_remaining_time_overflow_yields_none() {
        let m = make_machine(i64::MAX, 0, Some(20));
        assert_eq!(m.remaining_time_secs(), None);
    }
}
