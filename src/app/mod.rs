// ==========================================
// 实时生产看板 - 应用层
// ==========================================
// 职责: HTTP/WebSocket 集成, 连接前端与后端
// ==========================================

pub mod routes;
pub mod state;
pub mod ws;

// 重导出
pub use routes::build_router;
pub use state::{build_work_order_source, get_bind_address, get_default_db_path, AppState};
