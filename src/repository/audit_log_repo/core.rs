use crate::db::SharedConnection;
use crate::domain::audit_log::AuditLogEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::format_ts;
use rusqlite::{params, Connection};

pub(super) const AUDIT_COLUMNS: &str = "audit_id, validation_id, user_id, action_type, \
     duplicate_group_id, decision, rows_affected, details_json, created_at";

const INSERT_SQL: &str = r#"
    INSERT INTO audit_log (
        audit_id, validation_id, user_id, action_type,
        duplicate_group_id, decision, rows_affected, details_json, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

// ==========================================
// AuditLogRepository - 审计日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct AuditLogRepository {
    conn: SharedConnection,
}

impl AuditLogRepository {
    /// 创建新的审计日志仓储
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加一条审计日志
    ///
    /// # 返回
    /// - `Ok(audit_id)`: 成功插入
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, entry: &AuditLogEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, entry)?;
        Ok(entry.audit_id.clone())
    }

    /// 批量追加审计日志（单事务）
    pub fn batch_insert(&self, entries: &[AuditLogEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for entry in entries {
            Self::insert_with(&tx, entry)?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    fn insert_with(conn: &Connection, entry: &AuditLogEntry) -> RepositoryResult<()> {
        conn.execute(
            INSERT_SQL,
            params![
                entry.audit_id,
                entry.validation_id,
                entry.user_id,
                entry.action_type.as_str(),
                entry.duplicate_group_id,
                entry.decision,
                entry.rows_affected,
                entry.details_json.as_ref().map(|v| v.to_string()),
                format_ts(&entry.created_at),
            ],
        )?;
        Ok(())
    }
}
