// ==========================================
// 联系人导入去重系统 - 导入去重API
// ==========================================
// 职责: 封装 校验 / 执行 / 审计查询 / 合并预览
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, DedupConfigReader};
use crate::db::{open_shared_connection, SharedConnection};
use crate::domain::audit_log::{AuditLogFilter, AuditLogPage};
use crate::domain::dedup::RawRow;
use crate::domain::types::MatchKind;
use crate::domain::validation::{ExecuteRequest, ExecuteResult, GroupReport, ValidationSummary};
use crate::engine::merger::preview_merge;
use crate::importer::{DedupImporter, DedupImporterImpl, UniversalFileParser};
use crate::repository::{
    AuditLogRepository, ContactRepositoryImpl, ContactStore, DuplicateCacheRepository,
    ValidationSessionRepository,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 导入去重API
pub struct ImportApi {
    store: Arc<dyn ContactStore>,
    session_repo: Arc<ValidationSessionRepository>,
    cache_repo: Arc<DuplicateCacheRepository>,
    audit_repo: Arc<AuditLogRepository>,
    importer: DedupImporterImpl<ConfigManager>,
    config: ConfigManager,
}

impl ImportApi {
    /// 打开数据库文件创建 ImportApi（自动建库）
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_shared_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Ok(Self::from_connection(conn))
    }

    /// 从已有连接创建 ImportApi
    pub fn from_connection(conn: SharedConnection) -> Self {
        let store: Arc<dyn ContactStore> = Arc::new(ContactRepositoryImpl::new(conn.clone()));
        let session_repo = Arc::new(ValidationSessionRepository::new(conn.clone()));
        let cache_repo = Arc::new(DuplicateCacheRepository::new(conn.clone()));
        let audit_repo = Arc::new(AuditLogRepository::new(conn.clone()));

        let importer = DedupImporterImpl::new(
            store.clone(),
            session_repo.clone(),
            cache_repo.clone(),
            audit_repo.clone(),
            ConfigManager::from_connection(conn.clone()),
            Box::new(UniversalFileParser),
        );

        Self {
            store,
            session_repo,
            cache_repo,
            audit_repo,
            importer,
            config: ConfigManager::from_connection(conn),
        }
    }

    /// 校验导入文件
    ///
    /// # 参数
    /// - user_id: 操作人
    /// - file_path: 文件路径
    /// - mapping: 显式字段映射（可选）
    pub async fn validate_file(
        &self,
        user_id: &str,
        file_path: &str,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> ApiResult<ValidationSummary> {
        require_non_empty("user_id", user_id)?;
        Ok(self
            .importer
            .validate_file(user_id, Path::new(file_path), mapping)
            .await?)
    }

    /// 校验已解析的行（上游已完成文件解析）
    pub async fn validate_rows(
        &self,
        user_id: &str,
        file_name: Option<&str>,
        headers: &[String],
        rows: Vec<RawRow>,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> ApiResult<ValidationSummary> {
        require_non_empty("user_id", user_id)?;
        Ok(self
            .importer
            .validate_rows(user_id, file_name, headers, rows, mapping)
            .await?)
    }

    /// 并发校验多个文件，单个文件失败不影响其他文件
    pub async fn validate_files(
        &self,
        user_id: &str,
        file_paths: &[String],
    ) -> ApiResult<Vec<Result<ValidationSummary, String>>> {
        require_non_empty("user_id", user_id)?;
        let paths: Vec<PathBuf> = file_paths.iter().map(PathBuf::from).collect();
        Ok(self.importer.validate_files(user_id, paths).await?)
    }

    /// 执行人工决策
    ///
    /// # 返回
    /// - Ok(ExecuteResult): 逐条结果
    /// - Err(NotFound): 校验会话不存在
    /// - Err(AlreadyExecuted): 会话已执行
    pub async fn execute_import(&self, request: &ExecuteRequest) -> ApiResult<ExecuteResult> {
        require_non_empty("validation_id", &request.validation_id)?;
        require_non_empty("user_id", &request.user_id)?;

        let result = self.importer.execute(request).await?;
        info!(
            validation_id = %result.validation_id,
            created = result.created,
            updated = result.updated,
            failed = result.failed,
            "导入执行完成"
        );
        Ok(result)
    }

    /// 查询审计日志（只读，分页）
    ///
    /// # 说明
    /// - limit <= 0 或超过上限时取配置的单页上限
    /// - offset 不能为负
    pub async fn list_audit_logs(&self, filter: &AuditLogFilter) -> ApiResult<AuditLogPage> {
        if filter.offset < 0 {
            return Err(ApiError::InvalidInput(format!("offset 不能为负: {}", filter.offset)));
        }
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ApiError::InvalidInput(format!(
                    "时间范围无效: from={} 晚于 to={}",
                    from, to
                )));
            }
        }

        let max_page_size = self
            .config
            .get_audit_max_page_size()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let mut effective = filter.clone();
        if effective.limit <= 0 || effective.limit > max_page_size {
            effective.limit = max_page_size;
        }
        debug!(limit = effective.limit, offset = effective.offset, "查询审计日志");

        Ok(self.audit_repo.query(&effective)?)
    }

    /// 分组合并预览（按库中当前数据重新计算）
    ///
    /// # 返回
    /// - 分组报告；single 匹配时 preview 为与目标联系人的逐字段对比
    pub async fn preview_group(&self, validation_id: &str, group_id: &str) -> ApiResult<GroupReport> {
        let session = self
            .session_repo
            .find_by_id(validation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("校验会话 {}", validation_id)))?;
        let summary: ValidationSummary = serde_json::from_str(&session.summary_json)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let mut report = summary
            .group(group_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("分组 {}", group_id)))?;

        let cached = self.cache_repo.get(validation_id, group_id)?;
        let target = cached.and_then(|c| c.existing_contact_id);
        if let (MatchKind::Single, Some(contact_id)) = (report.classification, target) {
            match self.store.get_by_id(contact_id).await? {
                Some(contact) if contact.is_live() => {
                    report.preview = preview_merge(&report.merged.record, &contact);
                }
                _ => {
                    return Err(ApiError::NotFound(format!("联系人 #{}", contact_id)));
                }
            }
        }

        Ok(report)
    }
}

fn require_non_empty(name: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} 不能为空", name)));
    }
    Ok(())
}
