// ==========================================
// 实时生产看板 - ERPNext REST 客户端
// ==========================================
// 接口:
// - GET  {ERP_URL}/api/resource/Work Order?fields=..&filters=..
// - PUT  {ERP_URL}/api/resource/Work Order/{id}  body: {"status": ...}
// 认证: Authorization: token KEY:SECRET
// 红线: 传输失败不外抛 (拉取返回空, 回写只记日志)
// ==========================================

use super::WorkOrderSource;
use crate::config::erp_settings::ErpSettings;
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{ExternalWorkOrder, RawWorkOrder};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const WORK_ORDER_DOCTYPE: &str = "Work Order";

const WORK_ORDER_FIELDS: &str = r#"["name","qty","produced_qty","status","custom_machine_id","custom_pipe_size","custom_location"]"#;

const ACTIONABLE_FILTER: &str = r#"[["status","in",["Not Started","In Process"]]]"#;

/// 客户端内部错误 (不越过 WorkOrderSource 边界)
#[derive(Error, Debug)]
pub enum ErpClientError {
    #[error("ERP 地址非法: {0}")]
    InvalidUrl(String),

    #[error("ERP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Option<Vec<RawWorkOrder>>,
}

// ==========================================
// ErpNextClient
// ==========================================
pub struct ErpNextClient {
    http: Client,
    settings: ErpSettings,
}

impl ErpNextClient {
    pub fn new(settings: ErpSettings) -> Result<Self, ErpClientError> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http, settings })
    }

    /// 拼接资源 URL: {base}/api/resource/Work Order[/{id}]
    fn resource_url(&self, work_order_id: Option<&str>) -> Result<Url, ErpClientError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|e| ErpClientError::InvalidUrl(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ErpClientError::InvalidUrl(self.settings.base_url.clone()))?;
            segments.pop_if_empty().extend(["api", "resource", WORK_ORDER_DOCTYPE]);
            if let Some(id) = work_order_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn fetch_raw_work_orders(&self) -> Result<Vec<RawWorkOrder>, ErpClientError> {
        let url = self.resource_url(None)?;
        let response: ListResponse = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.settings.authorization_header())
            .header(ACCEPT, "application/json")
            .query(&[("fields", WORK_ORDER_FIELDS), ("filters", ACTIONABLE_FILTER)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn put_status(&self, work_order_id: &str, status: WorkOrderStatus) -> Result<(), ErpClientError> {
        let url = self.resource_url(Some(work_order_id))?;
        self.http
            .put(url)
            .header(AUTHORIZATION, self.settings.authorization_header())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "status": status.as_str() }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// 原始记录 → 领域对象; 不合格记录跳过并告警
pub(crate) fn convert_raw_work_orders(raw: Vec<RawWorkOrder>) -> Vec<ExternalWorkOrder> {
    raw.into_iter()
        .filter_map(|record| match ExternalWorkOrder::try_from(record) {
            Ok(wo) => Some(wo),
            Err(e) => {
                tracing::warn!("跳过不合格 ERP 工单记录: {}", e);
                None
            }
        })
        .filter(|wo| wo.status != WorkOrderStatus::Completed)
        .collect()
}

#[async_trait]
impl WorkOrderSource for ErpNextClient {
    async fn list_actionable_work_orders(&self) -> Vec<ExternalWorkOrder> {
        match self.fetch_raw_work_orders().await {
            Ok(raw) => convert_raw_work_orders(raw),
            Err(e) => {
                tracing::warn!("ERP 工单拉取失败: {}", e);
                Vec::new()
            }
        }
    }

    async fn set_work_order_status(&self, work_order_id: &str, status: WorkOrderStatus) {
        match self.put_status(work_order_id, status).await {
            Ok(()) => tracing::info!(work_order = work_order_id, %status, "ERP 工单状态已更新"),
            Err(e) => tracing::warn!(work_order = work_order_id, %status, "ERP 工单状态更新失败: {}", e),
        }
    }
}
