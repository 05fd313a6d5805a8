// ==========================================
// 联系人导入去重系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id = 'global')
// ==========================================

use crate::config::dedup_config_trait::{ConfigResult, DedupConfigReader};
use crate::db::{open_shared_connection, SharedConnection};
use crate::domain::contact::ContactField;
use crate::domain::types::MergeStrategy;
use crate::repository::error::RepositoryError;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: SharedConnection,
}

impl ConfigManager {
    /// 打开数据库文件创建 ConfigManager
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_shared_connection(db_path)?;
        Ok(Self { conn })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn get_positive_int(&self, key: &str, default: i64) -> ConfigResult<i64> {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|e| format!("配置项 {} 不是整数 ({}): {}", key, raw, e))?;
        if value <= 0 {
            return Err(format!("配置项 {} 必须为正数: {}", key, value).into());
        }
        Ok(value)
    }
}

#[async_trait]
impl DedupConfigReader for ConfigManager {
    async fn get_default_merge_strategy(&self) -> ConfigResult<MergeStrategy> {
        let raw = self.get_config_or_default(config_keys::DEFAULT_MERGE_STRATEGY, "csv_priority")?;
        Ok(raw.trim().parse::<MergeStrategy>()?)
    }

    async fn get_required_fields(&self) -> ConfigResult<Vec<ContactField>> {
        let raw = self.get_config_or_default(config_keys::REQUIRED_FIELDS, "")?;
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| -> ConfigResult<ContactField> {
                ContactField::parse(name)
                    .ok_or_else(|| format!("未知必填字段: {}", name).into())
            })
            .collect()
    }

    async fn get_identifier_chunk_size(&self) -> ConfigResult<usize> {
        Ok(self.get_positive_int(config_keys::IDENTIFIER_CHUNK_SIZE, 500)? as usize)
    }

    async fn get_audit_max_page_size(&self) -> ConfigResult<i64> {
        self.get_positive_int(config_keys::AUDIT_MAX_PAGE_SIZE, 200)
    }
}

// ==========================================
// 默认数据库路径
// ==========================================

/// 获取默认数据库路径
///
/// 优先级: 环境变量 CONTACT_DEDUP_DB_PATH > 用户数据目录 > 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var("CONTACT_DEDUP_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./contact_dedup.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("contact-dedup");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("contact_dedup.db");
        }
    }

    path.to_string_lossy().to_string()
}

pub mod config_keys {
    // 去重合并
    pub const DEFAULT_MERGE_STRATEGY: &str = "dedup.default_merge_strategy";
    pub const REQUIRED_FIELDS: &str = "dedup.required_fields"; // 逗号分隔
    pub const IDENTIFIER_CHUNK_SIZE: &str = "dedup.identifier_chunk_size";

    // 审计
    pub const AUDIT_MAX_PAGE_SIZE: &str = "audit.max_page_size";
}
