// ==========================================
// 实时生产看板 - ERPNext 连接配置
// ==========================================
// 来源: 环境变量 (启动时先加载 .env)
// - ERP_URL / ERP_API_KEY / ERP_API_SECRET: 缺一不可, 否则视为未配置
// - ERP_TIMEOUT_SECS: 请求超时, 默认 10 秒
// ==========================================

use std::time::Duration;

pub const DEFAULT_ERP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpSettings {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl ErpSettings {
    /// 从环境变量读取; 不完整时返回 None
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取 (便于测试)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = get("ERP_URL")?.trim_end_matches('/').to_string();
        let api_key = get("ERP_API_KEY")?;
        let api_secret = get("ERP_API_SECRET")?;
        let timeout_secs = get("ERP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_ERP_TIMEOUT_SECS);

        Some(Self {
            base_url,
            api_key,
            api_secret,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Authorization 头: `token KEY:SECRET`
    pub fn authorization_header(&self) -> String {
        format!("token {}:{}", self.api_key, self.api_secret)
    }
}
