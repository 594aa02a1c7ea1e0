// ==========================================
// 实时生产看板 - 机台播种
// ==========================================
// 规则: 机台表为空时, 每个厂区播种 12 台
// - Modan: 1..=12, Baldeya: 100..=111, Al-Khraj: 200..=211
// - 名称 Machine 1..Machine 12, 空闲, 目标 100, 管径 "20", 20 秒/米
// ==========================================

use crate::domain::machine::Machine;
use crate::repository::{MachineRepository, ProductionStore, RepositoryResult};

pub const PLANT_FLEET: &[(&str, i64)] = &[("Modan", 1), ("Baldeya", 100), ("Al-Khraj", 200)];
pub const MACHINES_PER_PLANT: i64 = 12;

const SEED_TARGET_QTY: i64 = 100;
const SEED_PIPE_SIZE: &str = "20";
const SEED_SECONDS_PER_METER: i64 = 20;

/// 生成默认机队 (按 id 升序)
pub fn default_fleet() -> Vec<Machine> {
    PLANT_FLEET
        .iter()
        .flat_map(|&(location, start_id)| {
            (0..MACHINES_PER_PLANT).map(move |i| {
                let mut m = Machine::new(start_id + i, location, format!("Machine {}", i + 1));
                m.target_qty = SEED_TARGET_QTY;
                m.pipe_size = Some(SEED_PIPE_SIZE.to_string());
                m.seconds_per_meter = Some(SEED_SECONDS_PER_METER);
                m
            })
        })
        .collect()
}

/// 表为空时播种, 返回新增数量
pub fn seed_fleet_if_empty(store: &ProductionStore) -> RepositoryResult<usize> {
    let inserted = store.session(|tx| -> RepositoryResult<usize> {
        let repo = MachineRepository::new(tx);
        if repo.count()? > 0 {
            return Ok(0);
        }
        let fleet = default_fleet();
        for machine in &fleet {
            repo.insert(machine)?;
        }
        Ok(fleet.len())
    })?;

    if inserted > 0 {
        tracing::info!(count = inserted, "机台表为空, 已播种默认机队");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fleet_layout() {
        let fleet = default_fleet();
        assert_eq!(fleet.len(), 36);
        assert_eq!(fleet[0].id, 1);
        assert_eq!(fleet[11].id, 12);
        assert_eq!(fleet[12].id, 100);
        assert_eq!(fleet[12].location, "Baldeya");
        assert_eq!(fleet[35].id, 211);
        assert_eq!(fleet[35].name, "Machine 12");
        assert!(fleet.iter().all(|m| m.is_assignment_candidate() && !m.has_work_order()));
    }

    #[test]
    fn test_seed_only_when_empty() {
        let store = ProductionStore::open_in_memory().unwrap();
        assert_eq!(seed_fleet_if_empty(&store).unwrap(), 36);
        assert_eq!(seed_fleet_if_empty(&store).unwrap(), 0);
    }
}
