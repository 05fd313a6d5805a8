use super::core::{AuditLogRepository, AUDIT_COLUMNS};
use crate::domain::audit_log::{AuditLogEntry, AuditLogFilter, AuditLogPage};
use crate::domain::types::AuditActionType;
use crate::repository::error::RepositoryResult;
use crate::repository::sql_utils::{format_ts, parse_ts};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Result as SqliteResult, Row};

impl AuditLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 audit_id 查询单条日志
    pub fn find_by_id(&self, audit_id: &str) -> RepositoryResult<Option<AuditLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM audit_log WHERE audit_id = ?1", AUDIT_COLUMNS);

        let entry = conn
            .query_row(&sql, params![audit_id], Self::map_row)
            .optional()?;
        Ok(entry)
    }

    /// 查询指定校验会话的全部日志（按写入顺序）
    pub fn find_by_validation_id(&self, validation_id: &str) -> RepositoryResult<Vec<AuditLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM audit_log WHERE validation_id = ?1 ORDER BY seq ASC",
            AUDIT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![validation_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(entries)
    }

    /// 条件分页查询（最新在前）
    ///
    /// # 说明
    /// - 所有条件为 AND 关系，未设置的条件不参与过滤
    /// - from/to 为闭区间
    /// - limit 由调用方限幅
    pub fn query(&self, filter: &AuditLogFilter) -> RepositoryResult<AuditLogPage> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(validation_id) = &filter.validation_id {
            clauses.push("validation_id = ?");
            args.push(Value::Text(validation_id.clone()));
        }
        if let Some(user_id) = &filter.user_id {
            clauses.push("user_id = ?");
            args.push(Value::Text(user_id.clone()));
        }
        if let Some(action_type) = filter.action_type {
            clauses.push("action_type = ?");
            args.push(Value::Text(action_type.as_str().to_string()));
        }
        if let Some(from) = &filter.from {
            clauses.push("created_at >= ?");
            args.push(Value::Text(format_ts(from)));
        }
        if let Some(to) = &filter.to {
            clauses.push("created_at <= ?");
            args.push(Value::Text(format_ts(to)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.get_conn()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM audit_log {}", where_sql),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM audit_log {} ORDER BY created_at DESC, seq DESC LIMIT ? OFFSET ?",
            AUDIT_COLUMNS, where_sql
        );
        let mut page_args = args.clone();
        page_args.push(Value::Integer(filter.limit));
        page_args.push(Value::Integer(filter.offset));

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(page_args.iter()), Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(AuditLogPage {
            entries,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 AuditLogEntry
    fn map_row(row: &Row) -> SqliteResult<AuditLogEntry> {
        let action_type_str: String = row.get(3)?;
        let action_type = AuditActionType::parse(&action_type_str)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(3, "action_type".to_string(), Type::Text))?;

        let details_json_str: Option<String> = row.get(7)?;
        let details_json = details_json_str.and_then(|s| serde_json::from_str(&s).ok());

        let created_at_str: String = row.get(8)?;

        Ok(AuditLogEntry {
            audit_id: row.get(0)?,
            validation_id: row.get(1)?,
            user_id: row.get(2)?,
            action_type,
            duplicate_group_id: row.get(4)?,
            decision: row.get(5)?,
            rows_affected: row.get(6)?,
            details_json,
            created_at: parse_ts(8, &created_at_str)?,
        })
    }
}
