// ==========================================
// 实时生产看板 - 周期任务调度
// ==========================================
// 三个独立周期任务:
// - 工单分派: assign_interval (默认 10 秒)
// - 计米模拟: meter_tick      (默认 1 秒)
// - 阈值告警: alert_interval  (默认 5 秒)
// 红线: 任一周期出错只记录日志, 等待下个周期, 绝不终止进程
// 说明: 每个周期独立开启会话, 会话不跨 await 持有
// ==========================================

use crate::config::EngineSettings;
use crate::engine::alert::AlertEngine;
use crate::engine::assignment::AssignmentEngine;
use crate::engine::notifier::NotificationHub;
use crate::engine::simulator::ProgressSimulator;
use crate::repository::ProductionStore;
use crate::source::WorkOrderSource;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// 已启动任务的句柄 (drop 不会停止任务; 需要时调用 abort)
pub struct SchedulerHandles {
    pub assignment: JoinHandle<()>,
    pub simulator: JoinHandle<()>,
    pub alerts: JoinHandle<()>,
}

impl SchedulerHandles {
    pub fn abort(&self) {
        self.assignment.abort();
        self.simulator.abort();
        self.alerts.abort();
    }
}

pub struct ProductionScheduler {
    store: ProductionStore,
    source: Arc<dyn WorkOrderSource>,
    hub: Arc<NotificationHub>,
    settings: EngineSettings,
}

fn periodic(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl ProductionScheduler {
    pub fn new(
        store: ProductionStore,
        source: Arc<dyn WorkOrderSource>,
        hub: Arc<NotificationHub>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            source,
            hub,
            settings,
        }
    }

    /// 启动全部周期任务 (需在 tokio 运行时内调用)
    pub fn spawn(self) -> SchedulerHandles {
        tracing::info!(
            assign_secs = self.settings.assign_interval.as_secs(),
            meter_secs = self.settings.meter_tick.as_secs(),
            alert_secs = self.settings.alert_interval.as_secs(),
            "周期任务启动"
        );

        SchedulerHandles {
            assignment: self.spawn_assignment_loop(),
            simulator: self.spawn_simulator_loop(),
            alerts: self.spawn_alert_loop(),
        }
    }

    fn spawn_assignment_loop(&self) -> JoinHandle<()> {
        let engine = AssignmentEngine::new(self.store.clone(), self.source.clone(), self.hub.clone());
        let period = self.settings.assign_interval;
        tokio::spawn(async move {
            let mut ticker = periodic(period);
            loop {
                ticker.tick().await;
                if let Err(e) = engine.run_cycle().await {
                    tracing::error!("工单分派周期失败: {}", e);
                }
            }
        })
    }

    fn spawn_simulator_loop(&self) -> JoinHandle<()> {
        let simulator = ProgressSimulator::new(self.store.clone(), self.source.clone(), self.hub.clone());
        let period = self.settings.meter_tick;
        tokio::spawn(async move {
            let mut ticker = periodic(period);
            loop {
                ticker.tick().await;
                if let Err(e) = simulator.tick(Utc::now()).await {
                    tracing::error!("计米周期失败: {}", e);
                }
            }
        })
    }

    fn spawn_alert_loop(&self) -> JoinHandle<()> {
        let mut engine = AlertEngine::new(self.settings.alert_thresholds);
        let store = self.store.clone();
        let hub = self.hub.clone();
        let period = self.settings.alert_interval;
        tokio::spawn(async move {
            let mut ticker = periodic(period);
            loop {
                ticker.tick().await;
                if let Err(e) = engine.tick(&store, &hub) {
                    tracing::error!("告警周期失败: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fleet::seed_fleet_if_empty;
    use crate::source::InMemoryWorkOrderSource;

    #[tokio::test]
    async fn test_loops_survive_and_can_be_aborted() {
        let store = ProductionStore::open_in_memory().unwrap();
        seed_fleet_if_empty(&store).unwrap();
        let settings = EngineSettings {
            assign_interval: Duration::from_millis(20),
            meter_tick: Duration::from_millis(10),
            alert_interval: Duration::from_millis(20),
            ..EngineSettings::default()
        };

        let handles = ProductionScheduler::new(
            store,
            Arc::new(InMemoryWorkOrderSource::default()),
            Arc::new(NotificationHub::default()),
            settings,
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!handles.assignment.is_finished());
        assert!(!handles.simulator.is_finished());
        assert!(!handles.alerts.is_finished());
        handles.abort();
    }
}
