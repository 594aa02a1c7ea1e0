// ==========================================
// 实时生产看板 - 产量流水仓储
// ==========================================
// 红线: 只追加; 不提供更新/删除
// ==========================================

use crate::domain::work_order::ProductionLogEntry;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Row};

fn map_log_row(row: &Row<'_>) -> rusqlite::Result<ProductionLogEntry> {
    Ok(ProductionLogEntry {
        log_id: row.get(0)?,
        machine_id: row.get(1)?,
        work_order: row.get(2)?,
        pipe_size: row.get(3)?,
        produced_delta: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

pub struct ProductionLogRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ProductionLogRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 追加一条流水
    pub fn append(&self, entry: &ProductionLogEntry) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO production_log (
                log_id, machine_id, work_order, pipe_size, produced_qty, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.log_id,
                entry.machine_id,
                entry.work_order,
                entry.pipe_size,
                entry.produced_delta,
                entry.timestamp,
            ],
        )?;
        Ok(())
    }

    /// 最近 N 条 (时间倒序)
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ProductionLogEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT log_id, machine_id, work_order, pipe_size, produced_qty, timestamp
            FROM production_log
            ORDER BY timestamp DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], map_log_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 流水总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM production_log", [], |row| row.get(0))?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::machine::Machine;
    use crate::repository::machine_repo::MachineRepository;
    use chrono::{Duration, Utc};

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        MachineRepository::new(&conn)
            .insert(&Machine::new(1, "Modan", "Machine 1"))
            .unwrap();
        conn
    }

    #[test]
    fn test_append_and_list_recent_newest_first() {
        let conn = setup_test_db();
        let repo = ProductionLogRepository::new(&conn);
        let t0 = Utc::now();

        for i in 0..3 {
            let entry = ProductionLogEntry::unit(1, "WO-1", Some("20".to_string()), t0 + Duration::seconds(i));
            repo.append(&entry).unwrap();
        }

        let recent = repo.list_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp > recent[1].timestamp);
        assert_eq!(repo.count().unwrap(), 3);
        assert!(recent.iter().all(|e| e.produced_delta == 1));
    }
}
