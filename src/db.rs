// ==========================================
// 实时生产看板 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表幂等 (CREATE TABLE IF NOT EXISTS)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化全部表结构（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS machine (
            id INTEGER PRIMARY KEY,
            location TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'free',
            is_locked INTEGER NOT NULL DEFAULT 0,
            work_order TEXT,
            pipe_size TEXT,
            target_qty INTEGER NOT NULL DEFAULT 0,
            produced_qty INTEGER NOT NULL DEFAULT 0,
            seconds_per_meter INTEGER,
            last_tick_time TEXT,
            CHECK (produced_qty <= target_qty OR target_qty = 0)
        );

        CREATE INDEX IF NOT EXISTS idx_machine_location_status
          ON machine(location, status);
        CREATE INDEX IF NOT EXISTS idx_machine_work_order
          ON machine(work_order);

        CREATE TABLE IF NOT EXISTS work_order_assignment (
            work_order TEXT PRIMARY KEY,
            machine_id INTEGER NOT NULL REFERENCES machine(id),
            erp_status TEXT NOT NULL,
            comments TEXT,
            last_synced TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS production_log (
            log_id TEXT PRIMARY KEY,
            machine_id INTEGER NOT NULL REFERENCES machine(id),
            work_order TEXT NOT NULL,
            pipe_size TEXT,
            produced_qty INTEGER NOT NULL DEFAULT 1,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_production_log_ts
          ON production_log(timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_production_log_work_order
          ON production_log(work_order);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 打开连接 + 建表，一步到位
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
