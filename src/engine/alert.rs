// ==========================================
// 实时生产看板 - 阈值告警引擎 (Alert Engine)
// ==========================================
// 等级: ≥completed_pct → 3, ≥critical_pct → 2, ≥warning_pct → 1, 否则 0
// 红线: 只在等级相对上次发出等级"上升"时告警
// 重置: 百分比回落到 warning_pct 以下 → 清除该机台历史
// 状态: AlertHistory 由引擎实例持有, 不使用全局状态
// 范围: 携带工单且目标 > 0 的 running 机台; completed 机台同样参与,
//       以便 100% 的完成告警能够发出 (历史去重保证只发一次)
// ==========================================

use crate::config::AlertThresholds;
use crate::domain::alert::AlertEvent;
use crate::domain::machine::Machine;
use crate::domain::types::{AlertLevel, MachineStatus};
use crate::engine::notifier::NotificationHub;
use crate::repository::{MachineRepository, ProductionStore, RepositoryResult};
use std::collections::HashMap;

// ==========================================
// AlertHistory - 每台机台最近一次发出的等级
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AlertHistory {
    levels: HashMap<i64, AlertLevel>,
}

impl AlertHistory {
    pub fn last_level(&self, machine_id: i64) -> AlertLevel {
        self.levels.get(&machine_id).copied().unwrap_or_default()
    }

    pub fn record(&mut self, machine_id: i64, level: AlertLevel) {
        self.levels.insert(machine_id, level);
    }

    pub fn clear(&mut self, machine_id: i64) {
        self.levels.remove(&machine_id);
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

// ==========================================
// AlertEngine
// ==========================================
#[derive(Debug, Clone)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
    history: AlertHistory,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            history: AlertHistory::default(),
        }
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    pub fn level_for(&self, percent: f64) -> AlertLevel {
        if percent >= self.thresholds.completed_pct {
            AlertLevel::Completed
        } else if percent >= self.thresholds.critical_pct {
            AlertLevel::Critical
        } else if percent >= self.thresholds.warning_pct {
            AlertLevel::Warning
        } else {
            AlertLevel::None
        }
    }

    /// 观察一次百分比, 等级上升时返回告警
    pub fn observe(&mut self, machine_id: i64, machine_name: &str, percent: f64) -> Option<AlertEvent> {
        if percent < self.thresholds.warning_pct {
            self.history.clear(machine_id);
            return None;
        }

        let level = self.level_for(percent);
        if level <= self.history.last_level(machine_id) {
            return None;
        }
        self.history.record(machine_id, level);
        Some(AlertEvent::for_machine(machine_id, machine_name, level, percent))
    }

    /// 评估一批机台
    pub fn evaluate(&mut self, machines: &[Machine]) -> Vec<AlertEvent> {
        machines
            .iter()
            .filter(|m| is_monitored(m))
            .filter_map(|m| self.observe(m.id, &m.name, m.progress_percent()))
            .collect()
    }

    /// 一个周期: 读取机台 → 评估 → 推送告警
    pub fn tick(&mut self, store: &ProductionStore, hub: &NotificationHub) -> RepositoryResult<Vec<AlertEvent>> {
        let machines = store.read(|conn| MachineRepository::new(conn).list_all())?;
        let alerts = self.evaluate(&machines);
        for alert in &alerts {
            tracing::info!(
                machine_id = alert.machine_id,
                level = alert.level.as_u8(),
                "{}",
                alert.message
            );
            hub.publish_alert(alert.clone());
        }
        Ok(alerts)
    }
}

fn is_monitored(machine: &Machine) -> bool {
    matches!(machine.status, MachineStatus::Running | MachineStatus::Completed)
        && machine.has_work_order()
        && machine.target_qty > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        let engine = AlertEngine::default();
        assert_eq!(engine.level_for(74.9), AlertLevel::None);
        assert_eq!(engine.level_for(75.0), AlertLevel::Warning);
        assert_eq!(engine.level_for(90.0), AlertLevel::Critical);
        assert_eq!(engine.level_for(100.0), AlertLevel::Completed);
    }

    #[test]
    fn test_alerts_only_on_upward_level_change() {
        let mut engine = AlertEngine::default();
        let emitted: Vec<(f64, AlertLevel)> = [70.0, 80.0, 95.0, 92.0, 99.0, 100.0]
            .into_iter()
            .filter_map(|p| engine.observe(1, "Machine 1", p).map(|a| (p, a.level)))
            .collect();

        assert_eq!(
            emitted,
            vec![
                (80.0, AlertLevel::Warning),
                (95.0, AlertLevel::Critical),
                (100.0, AlertLevel::Completed),
            ]
        );
    }

    #[test]
    fn test_history_resets_below_warning() {
        let mut engine = AlertEngine::default();
        assert!(engine.observe(1, "Machine 1", 80.0).is_some());
        assert!(engine.observe(1, "Machine 1", 10.0).is_none());
        assert!(engine.history().is_empty());
        // 新工单再次越过阈值 → 重新告警
        assert!(engine.observe(1, "Machine 1", 80.0).is_some());
    }

    #[test]
    fn test_history_is_per_machine() {
        let mut engine = AlertEngine::default();
        assert!(engine.observe(1, "Machine 1", 80.0).is_some());
        assert!(engine.observe(2, "Machine 2", 80.0).is_some());
        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn test_evaluate_ignores_unmonitored_machines() {
        let mut running = Machine::new(1, "X", "Machine 1");
        running.status = MachineStatus::Running;
        running.is_locked = true;
        running.work_order = Some("WO1".to_string());
        running.target_qty = 100;
        running.produced_qty = 95;

        let mut paused = running.clone();
        paused.id = 2;
        paused.status = MachineStatus::Paused;

        let mut free = Machine::new(3, "X", "Machine 3");
        free.target_qty = 100;
        free.produced_qty = 100;

        let alerts = AlertEngine::default().evaluate(&[running, paused, free]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].machine_id, 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].message, "Machine 1 CRITICAL 95.0%");
    }
}
