// ==========================================
// 实时生产看板 - HTTP 路由
// ==========================================
// GET  /api/dashboard              看板快照 {"locations": [...]}
// GET  /api/job_queue              工单队列 {"queue": [...]}
// GET  /api/production_logs?limit  产量流水 {"logs": [...]}
// POST /api/machine/{start,pause,stop,rename,release}
// GET  /ws/dashboard               推送订阅
// 错误响应: {"ok": false, "error": "..."}
// ==========================================

use crate::api::{ApiError, MachineAction, MachineRename};
use crate::app::state::AppState;
use crate::app::ws::ws_dashboard;
use crate::engine::projection::DashboardSnapshot;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

type HandlerResult = Result<Json<Value>, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BusinessRuleViolation(_) | ApiError::InvalidStateTransition { .. } => {
                StatusCode::CONFLICT
            }
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_)
            | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/job_queue", get(job_queue))
        .route("/api/production_logs", get(production_logs))
        .route("/api/machine/start", post(start_machine))
        .route("/api/machine/pause", post(pause_machine))
        .route("/api/machine/stop", post(stop_machine))
        .route("/api/machine/rename", post(rename_machine))
        .route("/api/machine/release", post(release_machine))
        .route("/ws/dashboard", get(ws_dashboard))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==========================================
// 查询
// ==========================================

async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardSnapshot>, ApiError> {
    Ok(Json(state.dashboard_api.dashboard()?))
}

async fn job_queue(State(state): State<AppState>) -> HandlerResult {
    let queue = state.dashboard_api.job_queue().await?;
    Ok(Json(json!({ "queue": queue })))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

async fn production_logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> HandlerResult {
    let logs = state.dashboard_api.production_logs(query.limit)?;
    Ok(Json(json!({ "logs": logs })))
}

// ==========================================
// 机台控制
// ==========================================

async fn start_machine(State(state): State<AppState>, Json(action): Json<MachineAction>) -> HandlerResult {
    let machine = state.machine_api.start(&action).await?;
    Ok(Json(json!({ "ok": true, "machine": machine })))
}

async fn pause_machine(State(state): State<AppState>, Json(action): Json<MachineAction>) -> HandlerResult {
    let machine = state.machine_api.pause(&action).await?;
    Ok(Json(json!({ "ok": true, "machine": machine })))
}

async fn stop_machine(State(state): State<AppState>, Json(action): Json<MachineAction>) -> HandlerResult {
    let machine = state.machine_api.stop(&action).await?;
    Ok(Json(json!({ "ok": true, "machine": machine })))
}

async fn release_machine(State(state): State<AppState>, Json(action): Json<MachineAction>) -> HandlerResult {
    let machine = state.machine_api.release(&action).await?;
    Ok(Json(json!({ "ok": true, "machine": machine })))
}

async fn rename_machine(State(state): State<AppState>, Json(request): Json<MachineRename>) -> HandlerResult {
    let machine = state.machine_api.rename(&request)?;
    Ok(Json(json!({ "ok": true, "machine": machine })))
}
