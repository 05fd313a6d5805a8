// ==========================================
// 联系人导入去重系统 - 重复分组缓存仓储
// ==========================================
// 职责: duplicate_cache 表读写
// 说明: 主键 (validation_id, duplicate_group_id)，同一会话内分组唯一
// ==========================================

use crate::db::SharedConnection;
use crate::domain::types::MatchKind;
use crate::domain::validation::DuplicateCacheEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::MutexGuard;

const CACHE_COLUMNS: &str = "validation_id, duplicate_group_id, classification, existing_contact_id, \
     candidate_ids_json, completeness_score, recommendation, row_numbers_json";

pub struct DuplicateCacheRepository {
    conn: SharedConnection,
}

impl DuplicateCacheRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入分组缓存（单事务）
    pub fn batch_insert(&self, entries: &[DuplicateCacheEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO duplicate_cache (
                    validation_id, duplicate_group_id, classification, existing_contact_id,
                    candidate_ids_json, completeness_score, recommendation, row_numbers_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    entry.validation_id,
                    entry.duplicate_group_id,
                    entry.classification.as_str(),
                    entry.existing_contact_id,
                    serde_json::to_string(&entry.candidate_contact_ids)?,
                    entry.completeness_score as i64,
                    entry.recommendation,
                    serde_json::to_string(&entry.row_numbers)?,
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    pub fn list_by_validation(&self, validation_id: &str) -> RepositoryResult<Vec<DuplicateCacheEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM duplicate_cache WHERE validation_id = ?1 ORDER BY duplicate_group_id",
            CACHE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![validation_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get(
        &self,
        validation_id: &str,
        duplicate_group_id: &str,
    ) -> RepositoryResult<Option<DuplicateCacheEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM duplicate_cache WHERE validation_id = ?1 AND duplicate_group_id = ?2",
            CACHE_COLUMNS
        );
        let entry = conn
            .query_row(&sql, params![validation_id, duplicate_group_id], Self::map_row)
            .optional()?;
        Ok(entry)
    }

    fn map_row(row: &Row) -> rusqlite::Result<DuplicateCacheEntry> {
        let classification_str: String = row.get(2)?;
        let candidate_json: String = row.get(4)?;
        let score: i64 = row.get(5)?;
        let row_numbers_json: String = row.get(7)?;

        let classification = MatchKind::parse(&classification_str).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(2, "classification".to_string(), Type::Text)
        })?;
        let candidate_contact_ids = serde_json::from_str(&candidate_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
        let row_numbers = serde_json::from_str(&row_numbers_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

        Ok(DuplicateCacheEntry {
            validation_id: row.get(0)?,
            duplicate_group_id: row.get(1)?,
            classification,
            existing_contact_id: row.get(3)?,
            candidate_contact_ids,
            completeness_score: score.max(0) as usize,
            recommendation: row.get(6)?,
            row_numbers,
        })
    }
}
