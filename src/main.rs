// ==========================================
// 实时生产看板 - 服务主入口
// ==========================================
// 启动顺序: .env → 日志 → 数据库 → 机台播种 → 周期任务 → HTTP 服务
// ==========================================

use anyhow::Context;
use live_production::app::{build_router, build_work_order_source, get_bind_address, get_default_db_path, AppState};
use live_production::engine::seed_fleet_if_empty;
use live_production::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 可选
    let _ = dotenv::dotenv();

    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", live_production::APP_NAME);
    tracing::info!("系统版本: {}", live_production::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let source = build_work_order_source();
    let state = AppState::new(db_path, source).map_err(anyhow::Error::msg)?;

    seed_fleet_if_empty(&state.store).context("机台播种失败")?;

    let scheduler = state.scheduler().spawn();

    let bind = get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("无法监听地址 {}", bind))?;
    tracing::info!("服务已启动: http://{}", bind);

    let app = build_router(state);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.abort();
    served.context("HTTP 服务异常退出")?;
    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号, 停止调度周期任务");
}
