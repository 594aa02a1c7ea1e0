// ==========================================
// 实时生产看板 - 机台数据仓储
// ==========================================
// 职责: machine 表的读写映射
// 红线: Repository 不含业务逻辑
// 约定: 所有列表查询按 id 升序 (分派/投影的"枚举顺序"以此为准)
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::MachineStatus;
use crate::repository::error::RepositoryResult;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const MACHINE_COLUMNS: &str = r#"
    id, location, name, status, is_locked, work_order, pipe_size,
    target_qty, produced_qty, seconds_per_meter, last_tick_time
"#;

/// 行映射: machine 表 → Machine
fn map_machine_row(row: &Row<'_>) -> rusqlite::Result<Machine> {
    let status_raw: String = row.get(3)?;
    let status = MachineStatus::from_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("未知机台状态: {}", status_raw).into(),
        )
    })?;

    Ok(Machine {
        id: row.get(0)?,
        location: row.get(1)?,
        name: row.get(2)?,
        status,
        is_locked: row.get::<_, i64>(4)? != 0,
        work_order: row.get(5)?,
        pipe_size: row.get(6)?,
        target_qty: row.get(7)?,
        produced_qty: row.get(8)?,
        seconds_per_meter: row.get(9)?,
        last_tick_time: row.get(10)?,
    })
}

// ==========================================
// MachineRepository - 机台仓储
// ==========================================
// 借用会话内的连接 (普通连接或事务均可)
pub struct MachineRepository<'c> {
    conn: &'c Connection,
}

impl<'c> MachineRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 机台总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM machine", [], |row| row.get(0))?;
        Ok(n)
    }

    /// 插入机台
    pub fn insert(&self, machine: &Machine) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO machine (
                id, location, name, status, is_locked, work_order, pipe_size,
                target_qty, produced_qty, seconds_per_meter, last_tick_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                machine.id,
                machine.location,
                machine.name,
                machine.status.to_db_str(),
                machine.is_locked as i64,
                machine.work_order,
                machine.pipe_size,
                machine.target_qty,
                machine.produced_qty,
                machine.seconds_per_meter,
                machine.last_tick_time,
            ],
        )?;
        Ok(())
    }

    /// 整行回写 (id、location 不变)
    pub fn update(&self, machine: &Machine) -> RepositoryResult<usize> {
        let affected = self.conn.execute(
            r#"
            UPDATE machine SET
                name = ?2,
                status = ?3,
                is_locked = ?4,
                work_order = ?5,
                pipe_size = ?6,
                target_qty = ?7,
                produced_qty = ?8,
                seconds_per_meter = ?9,
                last_tick_time = ?10
            WHERE id = ?1
            "#,
            params![
                machine.id,
                machine.name,
                machine.status.to_db_str(),
                machine.is_locked as i64,
                machine.work_order,
                machine.pipe_size,
                machine.target_qty,
                machine.produced_qty,
                machine.seconds_per_meter,
                machine.last_tick_time,
            ],
        )?;
        Ok(affected)
    }

    /// 全部机台
    pub fn list_all(&self) -> RepositoryResult<Vec<Machine>> {
        let sql = format!("SELECT {} FROM machine ORDER BY id ASC", MACHINE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_machine_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按状态过滤
    pub fn list_by_status(&self, status: MachineStatus) -> RepositoryResult<Vec<Machine>> {
        let sql = format!(
            "SELECT {} FROM machine WHERE status = ?1 ORDER BY id ASC",
            MACHINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.to_db_str()], map_machine_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 分派候选: 指定厂区 + 未锁定 + 状态 ∈ {free, paused, stopped}
    pub fn list_assignment_candidates(&self, location: &str) -> RepositoryResult<Vec<Machine>> {
        let sql = format!(
            r#"
            SELECT {} FROM machine
            WHERE location = ?1
              AND is_locked = 0
              AND status IN ('free', 'paused', 'stopped')
            ORDER BY id ASC
            "#,
            MACHINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![location], map_machine_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按 (厂区, id) 查找
    pub fn find(&self, location: &str, id: i64) -> RepositoryResult<Option<Machine>> {
        let sql = format!(
            "SELECT {} FROM machine WHERE id = ?1 AND location = ?2",
            MACHINE_COLUMNS
        );
        let machine = self
            .conn
            .query_row(&sql, params![id, location], map_machine_row)
            .optional()?;
        Ok(machine)
    }

    /// 按 id 查找
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Machine>> {
        let sql = format!("SELECT {} FROM machine WHERE id = ?1", MACHINE_COLUMNS);
        let machine = self
            .conn
            .query_row(&sql, params![id], map_machine_row)
            .optional()?;
        Ok(machine)
    }

    /// 查找当前承接该工单的机台
    pub fn find_by_work_order(&self, work_order: &str) -> RepositoryResult<Option<Machine>> {
        let sql = format!(
            "SELECT {} FROM machine WHERE work_order = ?1 ORDER BY id ASC LIMIT 1",
            MACHINE_COLUMNS
        );
        let machine = self
            .conn
            .query_row(&sql, params![work_order], map_machine_row)
            .optional()?;
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn
    }

    fn make_machine(id: i64, location: &str, status: MachineStatus, locked: bool) -> Machine {
        let mut m = Machine::new(id, location, format!("Machine {}", id));
        m.status = status;
        m.is_locked = locked;
        m.seconds_per_meter = Some(20);
        m.pipe_size = Some("20".to_string());
        m.target_qty = 100;
        m
    }

    #[test]
    fn test_insert_and_find() {
        let conn = setup_test_db();
        let repo = MachineRepository::new(&conn);

        let mut m = make_machine(1, "Modan", MachineStatus::Running, true);
        m.work_order = Some("WO-1".to_string());
        m.last_tick_time = Some(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
        repo.insert(&m).unwrap();

        let found = repo.find("Modan", 1).unwrap().unwrap();
        assert_eq!(found, m);

        // 厂区不匹配视为不存在
        assert!(repo.find("Baldeya", 1).unwrap().is_none());
        assert_eq!(repo.find_by_work_order("WO-1").unwrap().unwrap().id, 1);
    }

    #[test]
    fn test_candidates_filter_and_order() {
        let conn = setup_test_db();
        let repo = MachineRepository::new(&conn);

        repo.insert(&make_machine(5, "Modan", MachineStatus::Stopped, false)).unwrap();
        repo.insert(&make_machine(3, "Modan", MachineStatus::Free, false)).unwrap();
        repo.insert(&make_machine(4, "Modan", MachineStatus::Paused, true)).unwrap();
        repo.insert(&make_machine(2, "Modan", MachineStatus::Running, true)).unwrap();
        repo.insert(&make_machine(1, "Modan", MachineStatus::Completed, false)).unwrap();
        repo.insert(&make_machine(100, "Baldeya", MachineStatus::Free, false)).unwrap();

        let ids: Vec<i64> = repo
            .list_assignment_candidates("Modan")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_update_persists_progress() {
        let conn = setup_test_db();
        let repo = MachineRepository::new(&conn);

        let mut m = make_machine(7, "Modan", MachineStatus::Running, true);
        m.work_order = Some("WO-7".to_string());
        repo.insert(&m).unwrap();

        m.produced_qty = 42;
        assert_eq!(repo.update(&m).unwrap(), 1);

        let running = repo.list_by_status(MachineStatus::Running).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].produced_qty, 42);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_unknown_status_is_a_mapping_error() {
        let conn = setup_test_db();
        conn.execute(
            "INSERT INTO machine (id, location, name, status) VALUES (9, 'Modan', 'M9', 'exploded')",
            [],
        )
        .unwrap();

        let repo = MachineRepository::new(&conn);
        assert!(repo.list_all().is_err());
    }
}
