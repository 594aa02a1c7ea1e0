// ==========================================
// 实时生产看板 - 领域类型定义
// ==========================================
// 职责: 机台状态、外部工单状态、分派记录状态、告警等级
// 红线: 状态是封闭标签集合, 一律用枚举 + 穷举 match
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 机台状态 (Machine Status)
// ==========================================
// 流转: free → paused ⇄ running → completed
//       running → stopped, stopped → paused/running
// 序列化格式: 小写 (与数据库、前端一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Free,      // 空闲 (唯一无工单的状态)
    Paused,    // 已分派/暂停
    Stopped,   // 停机
    Running,   // 生产中
    Completed, // 工单完成
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl MachineStatus {
    /// 从字符串解析机台状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(MachineStatus::Free),
            "paused" => Some(MachineStatus::Paused),
            "stopped" => Some(MachineStatus::Stopped),
            "running" => Some(MachineStatus::Running),
            "completed" => Some(MachineStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MachineStatus::Free => "free",
            MachineStatus::Paused => "paused",
            MachineStatus::Stopped => "stopped",
            MachineStatus::Running => "running",
            MachineStatus::Completed => "completed",
        }
    }

    /// 是否可接收新工单 (仍需同时满足未锁定)
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            MachineStatus::Free | MachineStatus::Paused | MachineStatus::Stopped
        )
    }
}

// ==========================================
// 外部工单状态 (ERP Work Order Status)
// ==========================================
// 归属: 外部系统, 本系统只读取并请求状态变更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkOrderStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Process")]
    InProcess,
    #[serde(rename = "Completed")]
    Completed,
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkOrderStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Not Started" => Some(WorkOrderStatus::NotStarted),
            "In Process" => Some(WorkOrderStatus::InProcess),
            "Completed" => Some(WorkOrderStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::NotStarted => "Not Started",
            WorkOrderStatus::InProcess => "In Process",
            WorkOrderStatus::Completed => "Completed",
        }
    }
}

// ==========================================
// 分派记录中的外部同步状态 (ERP Sync Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErpSyncStatus {
    #[serde(rename = "Assigned")]
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl fmt::Display for ErpSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ErpSyncStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Assigned" => Some(ErpSyncStatus::Assigned),
            "In Progress" => Some(ErpSyncStatus::InProgress),
            "Completed" => Some(ErpSyncStatus::Completed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ErpSyncStatus::Assigned => "Assigned",
            ErpSyncStatus::InProgress => "In Progress",
            ErpSyncStatus::Completed => "Completed",
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErpSyncStatus::Completed)
    }
}

// ==========================================
// 告警等级 (Alert Level)
// ==========================================
// 顺序: None < Warning < Critical < Completed
// 红线: 只在等级"上升"时发出告警
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AlertLevel {
    #[default]
    None,     // 0 无告警
    Warning,  // 1 预警 (≥75%)
    Critical, // 2 严重 (≥90%)
    Completed, // 3 完成 (≥100%)
}

impl AlertLevel {
    /// 数值等级 (推送给前端的 level 字段)
    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::None => 0,
            AlertLevel::Warning => 1,
            AlertLevel::Critical => 2,
            AlertLevel::Completed => 3,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::None => write!(f, "NONE"),
            AlertLevel::Warning => write!(f, "WARNING"),
            AlertLevel::Critical => write!(f, "CRITICAL"),
            AlertLevel::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl Serialize for AlertLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}
