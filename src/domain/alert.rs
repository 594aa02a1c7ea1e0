// ==========================================
// 实时生产看板 - 告警领域模型
// ==========================================

use crate::domain::types::AlertLevel;
use serde::Serialize;

// ==========================================
// AlertEvent - 阈值告警事件
// ==========================================
// 推送格式: {"alert": message, "machine_id": id, "level": n}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    #[serde(rename = "alert")]
    pub message: String,
    pub machine_id: i64,
    pub level: AlertLevel,
}

impl AlertEvent {
    /// 按等级生成告警文案
    pub fn for_machine(machine_id: i64, machine_name: &str, level: AlertLevel, percent: f64) -> Self {
        let message = match level {
            AlertLevel::Completed => format!("Machine {} COMPLETED", machine_name),
            AlertLevel::Critical => format!("{} CRITICAL {:.1}%", machine_name, percent),
            AlertLevel::Warning => format!("{} Warning {:.1}%", machine_name, percent),
            AlertLevel::None => format!("{} {:.1}%", machine_name, percent),
        };

        Self {
            message,
            machine_id,
            level,
        }
    }
}
