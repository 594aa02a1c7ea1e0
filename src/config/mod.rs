// ==========================================
// 实时生产看板 - 配置层
// ==========================================
// 职责: 系统配置管理
// - 引擎参数: config_kv 表
// - 外部系统连接: 环境变量 / .env
// ==========================================

pub mod config_manager;
pub mod erp_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, AlertThresholds, ConfigManager, EngineSettings};
pub use erp_settings::ErpSettings;
