// ==========================================
// 联系人导入去重系统 - 校验会话仓储
// ==========================================
// 职责: validation_session 表读写
// 红线: 会话只能从 VALIDATED 迁移到 EXECUTED 一次
// ==========================================

use crate::db::SharedConnection;
use crate::domain::types::SessionStatus;
use crate::domain::validation::ValidationSession;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_ts, parse_ts};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::MutexGuard;

pub struct ValidationSessionRepository {
    conn: SharedConnection,
}

impl ValidationSessionRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存校验会话
    pub fn insert(&self, session: &ValidationSession) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO validation_session (
                validation_id, user_id, file_name, field_mapping_json,
                raw_rows_json, standalone_rows_json, summary_json, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                session.validation_id,
                session.user_id,
                session.file_name,
                serde_json::to_string(&session.field_mapping)?,
                session.raw_rows_json,
                serde_json::to_string(&session.standalone_rows)?,
                session.summary_json,
                session.status.as_str(),
                format_ts(&session.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, validation_id: &str) -> RepositoryResult<Option<ValidationSession>> {
        let conn = self.get_conn()?;
        let session = conn
            .query_row(
                r#"
                SELECT validation_id, user_id, file_name, field_mapping_json,
                       raw_rows_json, standalone_rows_json, summary_json, status, created_at
                FROM validation_session
                WHERE validation_id = ?1
                "#,
                params![validation_id],
                Self::map_row,
            )
            .optional()?;
        Ok(session)
    }

    /// 标记会话已执行
    ///
    /// # 返回
    /// - Ok(true): 本次调用完成状态迁移
    /// - Ok(false): 会话不存在或已执行过
    pub fn mark_executed(&self, validation_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE validation_session SET status = ?1 WHERE validation_id = ?2 AND status = ?3",
            params![
                SessionStatus::Executed.as_str(),
                validation_id,
                SessionStatus::Validated.as_str()
            ],
        )?;
        Ok(rows == 1)
    }

    fn map_row(row: &Row) -> rusqlite::Result<ValidationSession> {
        let mapping_json: String = row.get(3)?;
        let standalone_json: String = row.get(5)?;
        let status_str: String = row.get(7)?;
        let created_at: String = row.get(8)?;

        let field_mapping = serde_json::from_str(&mapping_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        let standalone_rows = serde_json::from_str(&standalone_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
        let status = SessionStatus::parse(&status_str)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(7, "status".to_string(), Type::Text))?;

        Ok(ValidationSession {
            validation_id: row.get(0)?,
            user_id: row.get(1)?,
            file_name: row.get(2)?,
            field_mapping,
            raw_rows_json: row.get(4)?,
            standalone_rows,
            summary_json: row.get(6)?,
            status,
            created_at: parse_ts(8, &created_at)?,
        })
    }
}
