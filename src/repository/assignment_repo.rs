// ==========================================
// 实时生产看板 - 工单分派记录仓储
// ==========================================
// 职责: work_order_assignment 表的读写映射
// 红线: 每个 work_order 至多一条 (主键约束); 只 upsert, 不删除
// ==========================================

use crate::domain::types::ErpSyncStatus;
use crate::domain::work_order::AssignmentRecord;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

fn map_assignment_row(row: &Row<'_>) -> rusqlite::Result<AssignmentRecord> {
    let status_raw: String = row.get(2)?;
    let erp_status = ErpSyncStatus::from_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("未知同步状态: {}", status_raw).into(),
        )
    })?;

    Ok(AssignmentRecord {
        work_order: row.get(0)?,
        machine_id: row.get(1)?,
        erp_status,
        comments: row.get(3)?,
        last_synced: row.get(4)?,
    })
}

// ==========================================
// AssignmentRepository - 分派记录仓储
// ==========================================
pub struct AssignmentRepository<'c> {
    conn: &'c Connection,
}

impl<'c> AssignmentRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 创建或更新分派记录
    /// 已存在时覆盖 machine_id / erp_status / last_synced, 保留 comments
    pub fn upsert(&self, record: &AssignmentRecord) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO work_order_assignment (
                work_order, machine_id, erp_status, comments, last_synced
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(work_order) DO UPDATE SET
                machine_id = excluded.machine_id,
                erp_status = excluded.erp_status,
                comments = COALESCE(excluded.comments, work_order_assignment.comments),
                last_synced = excluded.last_synced
            "#,
            params![
                record.work_order,
                record.machine_id,
                record.erp_status.to_db_str(),
                record.comments,
                record.last_synced,
            ],
        )?;
        Ok(())
    }

    /// 更新同步状态 (记录不存在时返回 0)
    pub fn set_status(
        &self,
        work_order: &str,
        status: ErpSyncStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let affected = self.conn.execute(
            "UPDATE work_order_assignment SET erp_status = ?2, last_synced = ?3 WHERE work_order = ?1",
            params![work_order, status.to_db_str(), now],
        )?;
        Ok(affected)
    }

    /// 按工单号查找
    pub fn find_by_work_order(&self, work_order: &str) -> RepositoryResult<Option<AssignmentRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT work_order, machine_id, erp_status, comments, last_synced
                FROM work_order_assignment
                WHERE work_order = ?1
                "#,
                params![work_order],
                map_assignment_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 是否已有分派记录
    pub fn exists(&self, work_order: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM work_order_assignment WHERE work_order = ?1 LIMIT 1",
                params![work_order],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 全部分派记录
    pub fn list_all(&self) -> RepositoryResult<Vec<AssignmentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT work_order, machine_id, erp_status, comments, last_synced
            FROM work_order_assignment
            ORDER BY work_order ASC
            "#,
        )?;
        let rows = stmt
            .query_map([], map_assignment_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
