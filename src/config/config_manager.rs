// ==========================================
// 实时生产看板 - 配置管理器
// ==========================================
// 职责: 引擎可调参数的加载、查询、覆写
// 存储: config_kv 表 (key-value + scope, 当前仅 global)
// 说明: 缺失或格式错误的配置项一律回落默认值并告警, 不中断启动
// ==========================================

use crate::db::configure_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// 周期配置上限 (秒)
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

// ==========================================
// 告警阈值 (百分比)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub warning_pct: f64,
    pub critical_pct: f64,
    pub completed_pct: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning_pct: 75.0,
            critical_pct: 90.0,
            completed_pct: 100.0,
        }
    }
}

impl AlertThresholds {
    /// 阈值必须严格递增且为正
    pub fn is_valid(&self) -> bool {
        self.warning_pct > 0.0
            && self.warning_pct < self.critical_pct
            && self.critical_pct < self.completed_pct
    }
}

// ==========================================
// 引擎运行参数
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub assign_interval: Duration, // 工单分派周期
    pub meter_tick: Duration,      // 计米模拟周期
    pub alert_interval: Duration,  // 告警评估周期
    pub alert_thresholds: AlertThresholds,
    pub production_log_default_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            assign_interval: Duration::from_secs(10),
            meter_tick: Duration::from_secs(1),
            alert_interval: Duration::from_secs(5),
            alert_thresholds: AlertThresholds::default(),
            production_log_default_limit: 50,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取全部 global 配置
    pub fn get_config_snapshot(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }

    /// 读取并解析, 失败回落默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取周期配置 (秒, 必须在 (0, MAX_INTERVAL_SECS] 内)
    fn get_interval_or(&self, key: &str, default: Duration) -> RepositoryResult<Duration> {
        let secs = self.get_parsed_or::<f64>(key, default.as_secs_f64())?;
        if secs <= 0.0 || secs > MAX_INTERVAL_SECS {
            tracing::warn!(config_key = key, secs, "周期配置非法，使用默认值");
            return Ok(default);
        }
        match Duration::try_from_secs_f64(secs) {
            Ok(interval) => Ok(interval),
            Err(e) => {
                tracing::warn!(config_key = key, secs, error = %e, "周期配置非法，使用默认值");
                Ok(default)
            }
        }
    }

    // ===== 告警阈值 =====

    pub fn get_alert_thresholds(&self) -> RepositoryResult<AlertThresholds> {
        let defaults = AlertThresholds::default();
        let thresholds = AlertThresholds {
            warning_pct: self.get_parsed_or(config_keys::ALERT_WARNING_PCT, defaults.warning_pct)?,
            critical_pct: self.get_parsed_or(config_keys::ALERT_CRITICAL_PCT, defaults.critical_pct)?,
            completed_pct: self
                .get_parsed_or(config_keys::ALERT_COMPLETED_PCT, defaults.completed_pct)?,
        };

        if thresholds.is_valid() {
            Ok(thresholds)
        } else {
            tracing::warn!(?thresholds, "告警阈值不满足递增关系，使用默认值");
            Ok(defaults)
        }
    }

    /// 汇总引擎运行参数
    pub fn load_engine_settings(&self) -> RepositoryResult<EngineSettings> {
        let defaults = EngineSettings::default();
        let limit = self.get_parsed_or::<usize>(
            config_keys::PRODUCTION_LOG_DEFAULT_LIMIT,
            defaults.production_log_default_limit,
        )?;

        Ok(EngineSettings {
            assign_interval: self
                .get_interval_or(config_keys::ASSIGN_INTERVAL_SECS, defaults.assign_interval)?,
            meter_tick: self.get_interval_or(config_keys::METER_TICK_SECS, defaults.meter_tick)?,
            alert_interval: self
                .get_interval_or(config_keys::ALERT_INTERVAL_SECS, defaults.alert_interval)?,
            alert_thresholds: self.get_alert_thresholds()?,
            production_log_default_limit: limit.max(1),
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 周期
    pub const ASSIGN_INTERVAL_SECS: &str = "assign_interval_secs";
    pub const METER_TICK_SECS: &str = "meter_tick_secs";
    pub const ALERT_INTERVAL_SECS: &str = "alert_interval_secs";

    // 告警阈值
    pub const ALERT_WARNING_PCT: &str = "alert_warning_pct";
    pub const ALERT_CRITICAL_PCT: &str = "alert_critical_pct";
    pub const ALERT_COMPLETED_PCT: &str = "alert_completed_pct";

    // 查询
    pub const PRODUCTION_LOG_DEFAULT_LIMIT: &str = "production_log_default_limit";
}
