// ==========================================
// 实时生产看板 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 由 axum 以 State 提取, 克隆成本为若干 Arc
// ==========================================

use std::sync::Arc;

use crate::api::{DashboardApi, MachineApi};
use crate::config::{ConfigManager, EngineSettings, ErpSettings};
use crate::engine::{MachineStateMachine, NotificationHub, ProductionScheduler};
use crate::db::read_schema_version;
use crate::repository::{ProductionStore, RepositoryResult};
use crate::source::{ErpNextClient, InMemoryWorkOrderSource, WorkOrderSource};

pub const DB_PATH_ENV: &str = "LIVE_PRODUCTION_DB_PATH";
pub const BIND_ENV: &str = "LIVE_PRODUCTION_BIND";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 数据库 schema 版本 (启动时读取)
    pub schema_version: Option<i64>,

    /// 生产数据存储 (共享连接)
    pub store: ProductionStore,

    /// 推送中心
    pub hub: Arc<NotificationHub>,

    /// 外部工单来源
    pub source: Arc<dyn WorkOrderSource>,

    /// 引擎运行参数 (启动时加载)
    pub settings: EngineSettings,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 机台控制API
    pub machine_api: Arc<MachineApi>,

    /// 看板查询API
    pub dashboard_api: Arc<DashboardApi>,
}

impl AppState {
    /// 打开数据库并组装全部组件
    pub fn new(db_path: String, source: Arc<dyn WorkOrderSource>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);
        let store = ProductionStore::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::with_store(db_path, store, source)
    }

    /// 基于已有存储组装 (测试可传入内存库)
    pub fn with_store(
        db_path: String,
        store: ProductionStore,
        source: Arc<dyn WorkOrderSource>,
    ) -> Result<Self, String> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(store.connection())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let settings = config_manager
            .load_engine_settings()
            .map_err(|e| format!("无法加载引擎参数: {}", e))?;
        let overrides = config_manager
            .get_config_snapshot()
            .map_err(|e| format!("无法读取配置快照: {}", e))?;
        let schema_version = store
            .read(|conn| -> RepositoryResult<Option<i64>> { Ok(read_schema_version(conn)?) })
            .map_err(|e| format!("无法读取schema版本: {}", e))?;
        tracing::info!(?schema_version, ?overrides, ?settings, "引擎参数已加载");

        let hub = Arc::new(NotificationHub::default());
        let state_machine = Arc::new(MachineStateMachine::new(
            store.clone(),
            source.clone(),
            hub.clone(),
        ));
        let machine_api = Arc::new(MachineApi::new(state_machine));
        let dashboard_api = Arc::new(DashboardApi::new(
            store.clone(),
            source.clone(),
            settings.production_log_default_limit,
        ));

        Ok(Self {
            db_path,
            schema_version,
            store,
            hub,
            source,
            settings,
            config_manager,
            machine_api,
            dashboard_api,
        })
    }

    /// 周期任务调度器 (共享同一存储/来源/推送中心)
    pub fn scheduler(&self) -> ProductionScheduler {
        ProductionScheduler::new(
            self.store.clone(),
            self.source.clone(),
            self.hub.clone(),
            self.settings.clone(),
        )
    }
}

/// 按环境变量选择工单来源: ERP 配置完整 → ERPNext, 否则空的内存来源
pub fn build_work_order_source() -> Arc<dyn WorkOrderSource> {
    match ErpSettings::from_env() {
        Some(settings) => {
            let base_url = settings.base_url.clone();
            match ErpNextClient::new(settings) {
                Ok(client) => {
                    tracing::info!("ERPNext 工单来源: {}", base_url);
                    Arc::new(client)
                }
                Err(e) => {
                    tracing::error!("ERPNext 客户端初始化失败, 使用空工单来源: {}", e);
                    Arc::new(InMemoryWorkOrderSource::default())
                }
            }
        }
        None => {
            tracing::warn!("未配置 ERP_URL/ERP_API_KEY/ERP_API_SECRET, 使用空工单来源");
            Arc::new(InMemoryWorkOrderSource::default())
        }
    }
}

/// 获取默认数据库路径
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./live_production.db");

    // 尝试获取用户数据目录
    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("live-production-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("live-production");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("live_production.db");
    }

    path.to_string_lossy().to_string()
}

/// 监听地址
pub fn get_bind_address() -> String {
    std::env::var(BIND_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_with_store_uses_default_settings() {
        let store = ProductionStore::open_in_memory().unwrap();
        let state = AppState::with_store(
            ":memory:".to_string(),
            store,
            Arc::new(InMemoryWorkOrderSource::default()),
        )
        .unwrap();

        assert_eq!(state.settings, EngineSettings::default());
        assert_eq!(state.schema_version, Some(crate::db::CURRENT_SCHEMA_VERSION));
        assert_eq!(state.hub.subscriber_count(), 0);
    }
}
