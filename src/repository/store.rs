// ==========================================
// 实时生产看板 - 持久化存储 (会话作用域事务)
// ==========================================
// 职责: 持有共享连接, 为每次调用开启一个会话
// 红线: 会话不跨 await 持有; 闭包返回 Err 即回滚, 返回 Ok 即提交
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_and_init};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ProductionStore - 生产数据存储
// ==========================================
#[derive(Clone)]
pub struct ProductionStore {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionStore {
    /// 从已有连接创建 (会补齐 PRAGMA 与表结构, 幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 打开数据库文件
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库 (测试/演示)
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 共享连接句柄 (供配置管理等组件复用)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 只读访问
    pub fn read<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }

    /// 会话: 开启事务 → 执行闭包 → 提交
    ///
    /// 闭包返回 Err 时事务随 drop 回滚, 锁随作用域释放
    pub fn session<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let out = f(&tx)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::machine::Machine;
    use crate::repository::machine_repo::MachineRepository;

    #[test]
    fn test_session_commits_on_ok() {
        let store = ProductionStore::open_in_memory().unwrap();

        store
            .session(|tx| MachineRepository::new(tx).insert(&Machine::new(1, "Modan", "Machine 1")))
            .unwrap();

        let count = store
            .read(|conn| MachineRepository::new(conn).count())
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_session_rolls_back_on_err() {
        let store = ProductionStore::open_in_memory().unwrap();

        let result: RepositoryResult<()> = store.session(|tx| {
            MachineRepository::new(tx).insert(&Machine::new(1, "Modan", "Machine 1"))?;
            Err(RepositoryError::InternalError("boom".to_string()))
        });
        assert!(result.is_err());

        let count = store
            .read(|conn| MachineRepository::new(conn).count())
            .unwrap();
        assert_eq!(count, 0);
    }
}
