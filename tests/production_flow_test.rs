// ==========================================
// 生产流程集成测试
// ==========================================
// 场景: 分派 → 启动 → 计米 → 完成 → 释放 → 再分派
// 覆盖: 幂等分派、管径优先/回退、单拍单单位、钳制完成、锁定不变式、推送
// ==========================================


use chrono::{Duration, Utc};
use live_production::api::{MachineAction, MachineApi};
use live_production::domain::types::{AlertLevel, ErpSyncStatus, MachineStatus, WorkOrderStatus};
use live_production::engine::{AlertEngine, DashboardMessage};
use std::sync::Arc;
use test_helpers::{free_machine, running_machine, work_order, TestContext};

// ==========================================
// 端到端场景
// ==========================================

#[tokio::test]
async fn test_end_to_end_assign_start_and_tick() {
    live_production::logging::init_test();
    let ctx = TestContext::new();
    ctx.insert_machines(&[free_machine(1, "X", "20")]);
    ctx.source.replace(vec![work_order("WO1", 100, "20", "X")]);

    // 分派
    let assigned = ctx.assignment_engine().run_cycle().await.unwrap();
    assert_eq!(assigned.len(), 1);
    let machine = ctx.machine(1);
    assert_eq!(machine.work_order.as_deref(), Some("WO1"));
    assert_eq!(machine.status, MachineStatus::Paused);
    assert!(machine.is_locked);
    assert_eq!(ctx.record("WO1").unwrap().erp_status, ErpSyncStatus::Assigned);

    // 启动
    let machine = ctx
        .state_machine()
        .transition("X", 1, MachineStatus::Running)
        .await
        .unwrap();
    let started_at = machine.last_tick_time.expect("启动后应设置 last_tick_time");
    assert!(machine.is_locked);
    assert_eq!(
        ctx.source.status_requests(),
        vec![("WO1".to_string(), WorkOrderStatus::InProcess)]
    );

    // 一拍
    let outcome = ctx
        .simulator()
        .tick(started_at + Duration::seconds(20))
        .await
        .unwrap();
    assert_eq!(outcome.advanced, vec![1]);
    assert_eq!(ctx.machine(1).produced_qty, 1);
    assert_eq!(ctx.log_count(), 1);
    assert_eq!(ctx.record("WO1").unwrap().erp_status, ErpSyncStatus::InProgress);
}

// ==========================================
// 分派
// ==========================================

#[tokio::test]
async fn test_assignment_is_idempotent_across_cycles() {
    let ctx = TestContext::new();
    ctx.insert_machines(&[free_machine(1, "X", "20"), free_machine(2, "X", "20")]);
    ctx.source.replace(vec![work_order("WO1", 50, "20", "X")]);

    let engine = ctx.assignment_engine();
    assert_eq!(engine.run_cycle().await.unwrap().len(), 1);
    let before = ctx.all_machines();

    assert!(engine.run_cycle().await.unwrap().is_empty());
    assert_eq!(ctx.all_machines(), before);
    assert_eq!(ctx.record_count(), 1);
}

#[test]
fn test_pipe_size_preference_and_fallback() {
    let ctx = TestContext::new();
    ctx.insert_machines(&[
        free_machine(1, "X", "A"),
        free_machine(2, "X", "B"),
        free_machine(3, "X", "B"),
    ]);
    let engine = ctx.assignment_engine();
    let now = Utc::now();

    let preferred = engine.assign_work_orders(&[work_order("WO-B", 10, "B", "X")], now);
    assert_eq!(preferred[0].machine_id, 2);

    let fallback = engine.assign_work_orders(&[work_order("WO-C", 10, "C", "X")], now);
    assert_eq!(fallback[0].machine_id, 1);
}

#[test]
fn test_in_process_and_externally_assigned_orders_are_untouched() {
    let ctx = TestContext::new();
    ctx.insert_machines(&[free_machine(1, "X", "20")]);

    let mut in_process = work_order("WO1", 10, "20", "X");
    in_process.status = WorkOrderStatus::InProcess;
    let mut external = work_order("WO2", 10, "20", "X");
    external.preferred_machine_id = Some("1".to_string());

    let done = ctx
        .assignment_engine()
        .assign_work_orders(&[in_process, external], Utc::now());
    assert!(done.is_empty());
    assert_eq!(ctx.machine(1).status, MachineStatus::Free);
    assert_eq!(ctx.record_count(), 0);
}

#[test]
fn test_no_candidate_at_location_is_retried_later() {
    let ctx = TestContext::new();
    ctx.insert_machines(&[free_machine(1, "Y", "20")]);
    let engine = ctx.assignment_engine();

    let order = work_order("WO1", 10, "20", "X");
    assert!(engine.assign_work_orders(&[order.clone()], Utc::now()).is_empty());

    ctx.insert_machines(&[free_machine(2, "X", "20")]);
    assert_eq!(engine.assign_work_orders(&[order], Utc::now())[0].machine_id, 2);
}

#[test]
fn test_store_failure_rolls_back_only_that_work_order() {
    let ctx = TestContext::new();
    ctx.insert_machines(&[
        free_machine(1, "X", "A"),
        free_machine(2, "X", "A"),
        free_machine(3, "X", "B"),
    ]);
    ctx.execute_sql(
        "CREATE TRIGGER reject_wo2 BEFORE INSERT ON work_order_assignment \
         WHEN NEW.work_order = 'WO2' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    );
    let engine = ctx.assignment_engine();
    let orders = vec![
        work_order("WO1", 10, "A", "X"),
        work_order("WO2", 10, "B", "X"),
        work_order("WO3", 10, "A", "X"),
    ];

    let assigned = engine.assign_work_orders(&orders, Utc::now());
    let bound: Vec<(&str, i64)> = assigned
        .iter()
        .map(|a| (a.work_order.as_str(), a.machine_id))
        .collect();
    assert_eq!(bound, vec![("WO1", 1), ("WO3", 2)]);

    // WO2 选中的机台保持原状, 无分派记录
    let m3 = ctx.machine(3);
    assert_eq!(m3.status, MachineStatus::Free);
    assert!(!m3.is_locked);
    assert!(!m3.has_work_order());
    assert!(ctx.record("WO2").is_none());
    assert_eq!(ctx.record_count(), 2);

    // 故障消除后下一周期补上
    ctx.execute_sql("DROP TRIGGER reject_wo2;");
    let retried = engine.assign_work_orders(&orders, Utc::now());
    assert_eq!(retried.len(), 1);
    assert_eq!(retried[0].work_order, "WO2");
    assert_eq!(retried[0].machine_id, 3);
    assert_eq!(ctx.machine(3).work_order.as_deref(), Some("WO2"));
    assert_eq!(ctx.record("WO2").unwrap().erp_status, ErpSyncStatus::Assigned);
}

// ==========================================
// 计米模拟
// ==========================================

#[tokio::test]
async fn test_first_tick_initializes_without_advancing() {
    let ctx = TestContext::new();
    ctx.insert_assigned(&running_machine(1, "X", "WO1", 100, 0));

    let outcome = ctx.simulator().tick(Utc::now()).await.unwrap();
    assert_eq!(outcome.initialized, vec![1]);
    assert!(!outcome.has_progress());
    assert!(ctx.machine(1).last_tick_time.is_some());
    assert_eq!(ctx.log_count(), 0);
}

#[tokio::test]
async fn test_single_unit_per_tick_after_long_delay() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let mut m = running_machine(1, "X", "WO1", 100, 0);
    m.last_tick_time = Some(now - Duration::seconds(100)); // 5 × seconds_per_meter
    ctx.insert_assigned(&m);

    ctx.simulator().tick(now).await.unwrap();

    let m = ctx.machine(1);
    assert_eq!(m.produced_qty, 1);
    assert_eq!(m.last_tick_time, Some(now));
    assert_eq!(ctx.log_count(), 1);
}

#[tokio::test]
async fn test_clamp_and_complete() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let mut m = running_machine(1, "X", "WO1", 100, 99);
    m.last_tick_time = Some(now - Duration::seconds(20));
    ctx.insert_assigned(&m);

    let outcome = ctx.simulator().tick(now).await.unwrap();
    assert_eq!(outcome.completed, vec![1]);

    let m = ctx.machine(1);
    assert_eq!(m.produced_qty, 100);
    assert_eq!(m.status, MachineStatus::Completed);
    assert!(!m.is_locked);
    assert_eq!(ctx.record("WO1").unwrap().erp_status, ErpSyncStatus::Completed);
    assert_eq!(
        ctx.source.status_requests(),
        vec![("WO1".to_string(), WorkOrderStatus::Completed)]
    );

    // 已完成机台不再推进
    let later = ctx
        .simulator()
        .tick(now + Duration::seconds(60))
        .await
        .unwrap();
    assert!(!later.has_progress());
    assert_eq!(ctx.machine(1).produced_qty, 100);
}

#[tokio::test]
async fn test_snapshot_published_only_when_progress() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let mut m = running_machine(1, "X", "WO1", 100, 0);
    m.last_tick_time = Some(now - Duration::seconds(5));
    ctx.insert_assigned(&m);
    let mut sub = ctx.hub.subscribe();

    ctx.simulator().tick(now).await.unwrap();
    assert!(sub.receiver.try_recv().is_err());

    ctx.simulator()
        .tick(now + Duration::seconds(20))
        .await
        .unwrap();
    match sub.receiver.try_recv() {
        Ok(DashboardMessage::Snapshot(snapshot)) => {
            let job = snapshot.locations[0].machines[0].job.clone().unwrap();
            assert_eq!(job.produced_qty, 1);
        }
        other => panic!("期望快照消息, 实际: {:?}", other),
    }
}

// ==========================================
// 状态机与锁定不变式
// ==========================================

#[tokio::test]
async fn test_lock_invariant_across_lifecycle() {
    let ctx = TestContext::new();
    ctx.insert_machines(&[free_machine(1, "X", "20"), free_machine(2, "X", "20")]);
    ctx.source.replace(vec![
        work_order("WO1", 2, "20", "X"),
        work_order("WO2", 5, "20", "X"),
    ]);
    ctx.assignment_engine().run_cycle().await.unwrap();

    let sm = ctx.state_machine();
    sm.transition("X", 1, MachineStatus::Running).await.unwrap();
    sm.transition("X", 2, MachineStatus::Running).await.unwrap();
    sm.transition("X", 2, MachineStatus::Stopped).await.unwrap();

    let simulator = ctx.simulator();
    let mut now = Utc::now();
    for _ in 0..4 {
        now += Duration::seconds(20);
        simulator.tick(now).await.unwrap();
        for m in ctx.all_machines() {
            if m.status == MachineStatus::Running {
                assert!(m.is_locked, "running 机台必须锁定: {}", m.id);
            }
        }
    }

    let m1 = ctx.machine(1);
    assert_eq!(m1.status, MachineStatus::Completed);
    assert!(!m1.is_locked);
    // 停机机台不推进
    assert_eq!(ctx.machine(2).produced_qty, 0);
}

#[tokio::test]
async fn test_release_makes_completed_machine_assignable_again() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let mut m = running_machine(1, "X", "WO1", 1, 0);
    m.last_tick_time = Some(now - Duration::seconds(20));
    ctx.insert_assigned(&m);
    ctx.simulator().tick(now).await.unwrap();
    assert_eq!(ctx.machine(1).status, MachineStatus::Completed);

    let api = MachineApi::new(Arc::new(ctx.state_machine()));
    let released = api
        .release(&MachineAction {
            location: "X".to_string(),
            machine_id: 1,
        })
        .await
        .unwrap();
    assert_eq!(released.status, MachineStatus::Free);
    assert!(!released.has_work_order());

    let assigned = ctx
        .assignment_engine()
        .assign_work_orders(&[work_order("WO2", 10, "20", "X")], Utc::now());
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].machine_id, 1);
    // 历史分派记录保留
    assert_eq!(ctx.record("WO1").unwrap().erp_status, ErpSyncStatus::Completed);
}

// ==========================================
// 告警
// ==========================================

#[tokio::test]
async fn test_alert_tick_publishes_once_per_level() {
    let ctx = TestContext::new();
    ctx.insert_assigned(&running_machine(1, "X", "WO1", 100, 80));
    let mut sub = ctx.hub.subscribe();
    let mut engine = AlertEngine::default();

    let alerts = engine.tick(&ctx.store, &ctx.hub).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert!(matches!(sub.receiver.try_recv(), Ok(DashboardMessage::Alert(_))));

    // 等级未变化 → 不重复
    assert!(engine.tick(&ctx.store, &ctx.hub).unwrap().is_empty());
    assert!(sub.receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_completion_alert_fires_after_machine_completes() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let mut m = running_machine(1, "X", "WO1", 10, 9);
    m.last_tick_time = Some(now - Duration::seconds(20));
    ctx.insert_assigned(&m);
    let mut engine = AlertEngine::default();

    assert_eq!(engine.tick(&ctx.store, &ctx.hub).unwrap()[0].level, AlertLevel::Critical);
    ctx.simulator().tick(now).await.unwrap();

    let alerts = engine.tick(&ctx.store, &ctx.hub).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Completed);
    assert_eq!(alerts[0].message, "Machine Machine 1 COMPLETED");
}
