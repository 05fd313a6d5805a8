// ==========================================
// 联系人导入去重系统 - 导入去重器实现
// ==========================================
// 职责: 串联校验流程与执行流程
// 校验: 映射 → DQ 校验 → 分组 → 库内匹配 → 汇总 → 持久化会话
// 执行: 领取会话 → 重放映射与合并 → 逐条决策 → 审计
// ==========================================

use crate::config::{config_keys, DedupConfigReader};
use crate::domain::contact::ContactRecord;
use crate::domain::dedup::RawRow;
use crate::domain::types::SessionStatus;
use crate::domain::validation::{
    ExecuteRequest, ExecuteResult, ValidationSession, ValidationSummary,
};
use crate::engine::grouper::DuplicateGrouper;
use crate::engine::matcher::ExternalMatcher;
use crate::engine::merger::merge_internal_duplicates;
use crate::importer::contact_importer_trait::{DedupImporter, FileParser};
use crate::importer::decision_executor::DecisionExecutor;
use crate::importer::dq_validator::DqValidator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapping;
use crate::importer::summary_builder::{RowAssessment, SummaryBuilder};
use crate::repository::{
    AuditLogRepository, ContactStore, DuplicateCacheRepository, RepositoryError,
    ValidationSessionRepository,
};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// DedupImporterImpl - 导入去重器实现
// ==========================================
pub struct DedupImporterImpl<C>
where
    C: DedupConfigReader,
{
    // 数据访问层
    store: Arc<dyn ContactStore>,
    session_repo: Arc<ValidationSessionRepository>,
    cache_repo: Arc<DuplicateCacheRepository>,
    audit_repo: Arc<AuditLogRepository>,

    // 配置读取器
    config: C,

    // 文件解析
    file_parser: Box<dyn FileParser>,
}

impl<C> DedupImporterImpl<C>
where
    C: DedupConfigReader,
{
    /// 创建导入去重器
    ///
    /// # 参数
    /// - store: 联系人存储
    /// - session_repo / cache_repo: 校验会话与重复缓存
    /// - audit_repo: 审计日志（只追加）
    /// - config: 配置读取器
    /// - file_parser: 文件解析器
    pub fn new(
        store: Arc<dyn ContactStore>,
        session_repo: Arc<ValidationSessionRepository>,
        cache_repo: Arc<DuplicateCacheRepository>,
        audit_repo: Arc<AuditLogRepository>,
        config: C,
        file_parser: Box<dyn FileParser>,
    ) -> Self {
        Self {
            store,
            session_repo,
            cache_repo,
            audit_repo,
            config,
            file_parser,
        }
    }
}

#[async_trait::async_trait]
impl<C> DedupImporter for DedupImporterImpl<C>
where
    C: DedupConfigReader + Send + Sync,
{
    #[instrument(skip(self, file_path, mapping))]
    async fn validate_file(
        &self,
        user_id: &str,
        file_path: &Path,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> ImportResult<ValidationSummary> {
        info!(file_path = %file_path.display(), "开始解析导入文件");

        let parsed = self.file_parser.parse_to_raw_rows(file_path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        info!(total_rows = parsed.rows.len(), "文件解析完成");

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());

        self.validate_rows(user_id, file_name.as_deref(), &parsed.headers, parsed.rows, mapping)
            .await
    }

    #[instrument(skip(self, headers, rows, mapping), fields(validation_id))]
    async fn validate_rows(
        &self,
        user_id: &str,
        file_name: Option<&str>,
        headers: &[String],
        rows: Vec<RawRow>,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> ImportResult<ValidationSummary> {
        let validation_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("validation_id", validation_id.as_str());
        info!(validation_id = %validation_id, total_rows = rows.len(), "开始校验");

        // === 步骤 1: 字段映射 ===
        debug!("步骤 1: 字段映射");
        let field_mapping = FieldMapping::resolve(headers, mapping)?;

        // === 步骤 2: DQ 校验 ===
        debug!("步骤 2: 数据质量校验");
        let required = self
            .config
            .get_required_fields()
            .await
            .map_err(|e| config_error(config_keys::REQUIRED_FIELDS, e))?;
        let validator = DqValidator::new(required);

        let assessments: Vec<RowAssessment> = rows
            .iter()
            .map(|raw| {
                let mapped = field_mapping.map_row(raw);
                let mut violations = mapped.conflicts;
                violations.extend(validator.validate_row(&mapped.record));
                RowAssessment {
                    record: mapped.record,
                    violations,
                }
            })
            .collect();

        let invalid = assessments.iter().filter(|a| a.is_invalid()).count();
        if invalid > 0 {
            warn!(invalid, "存在无效行");
        }

        // === 步骤 3: 批次内分组 ===
        debug!("步骤 3: 批次内分组");
        let eligible: Vec<ContactRecord> = assessments
            .iter()
            .filter(|a| a.is_eligible())
            .map(|a| a.record.clone())
            .collect();
        let groups = DuplicateGrouper::new().group(&eligible);

        // === 步骤 4: 库内匹配 ===
        debug!(groups = groups.len(), "步骤 4: 库内匹配");
        let chunk_size = self
            .config
            .get_identifier_chunk_size()
            .await
            .map_err(|e| config_error(config_keys::IDENTIFIER_CHUNK_SIZE, e))?;
        let matches = ExternalMatcher::with_chunk_size(self.store.clone(), chunk_size)
            .match_groups(&groups)
            .await?;

        // === 步骤 5: 汇总 ===
        debug!("步骤 5: 构建校验汇总");
        let built = SummaryBuilder::build(&validation_id, &assessments, &groups, &matches);

        // === 步骤 6: 持久化会话与重复缓存 ===
        debug!("步骤 6: 持久化校验会话");
        let session = ValidationSession {
            validation_id: validation_id.clone(),
            user_id: user_id.to_string(),
            file_name: file_name.map(|s| s.to_string()),
            field_mapping: field_mapping.to_map(),
            raw_rows_json: serde_json::to_string(&rows)?,
            standalone_rows: built.standalone_rows.clone(),
            summary_json: serde_json::to_string(&built.summary)?,
            status: SessionStatus::Validated,
            created_at: chrono::Utc::now().naive_utc(),
        };
        self.session_repo.insert(&session)?;
        self.cache_repo.batch_insert(&built.cache_entries)?;

        let summary = built.summary;
        info!(
            validation_id = %validation_id,
            new_rows = summary.new_rows.len(),
            duplicate_rows = summary.duplicate_rows.len(),
            conflict_rows = summary.conflict_rows.len(),
            invalid_rows = summary.invalid_rows.len(),
            "校验完成"
        );

        Ok(summary)
    }

    async fn validate_files(
        &self,
        user_id: &str,
        file_paths: Vec<PathBuf>,
    ) -> ImportResult<Vec<Result<ValidationSummary, String>>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量校验文件");

        let tasks = file_paths.into_iter().map(|path| async move {
            let path_str = path.display().to_string();
            match self.validate_file(user_id, &path, None).await {
                Ok(summary) => {
                    info!(file = %path_str, validation_id = %summary.validation_id, "文件校验成功");
                    Ok(summary)
                }
                Err(e) => {
                    error!(file = %path_str, error = %e, "文件校验失败");
                    Err(format!("文件 {} 校验失败: {}", path_str, e))
                }
            }
        });

        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量校验完成"
        );

        Ok(results)
    }

    #[instrument(skip(self, request), fields(validation_id = %request.validation_id, user_id = %request.user_id))]
    async fn execute(&self, request: &ExecuteRequest) -> ImportResult<ExecuteResult> {
        info!(decisions = request.decisions.len(), "开始执行决策");

        // === 步骤 1: 会话检查 ===
        let session = self
            .session_repo
            .find_by_id(&request.validation_id)?
            .ok_or_else(|| ImportError::SessionNotFound(request.validation_id.clone()))?;
        if session.status == SessionStatus::Executed {
            return Err(ImportError::SessionAlreadyExecuted(request.validation_id.clone()));
        }
        if !request.field_mapping.is_empty() && request.field_mapping != session.field_mapping {
            return Err(ImportError::MappingMismatch(request.validation_id.clone()));
        }

        let default_strategy = self
            .config
            .get_default_merge_strategy()
            .await
            .map_err(|e| config_error(config_keys::DEFAULT_MERGE_STRATEGY, e))?;

        // 领取会话: 并发执行同一会话时只有一个调用成功
        if !self.session_repo.mark_executed(&request.validation_id)? {
            return Err(ImportError::SessionAlreadyExecuted(request.validation_id.clone()));
        }

        // === 步骤 2: 重放映射与合并 ===
        let cache = self.cache_repo.list_by_validation(&request.validation_id)?;
        let summary = self.replay_summary(&session, &cache)?;

        // === 步骤 3: 逐条执行 ===
        let executor = DecisionExecutor::new(self.store.clone(), self.audit_repo.clone(), default_strategy);
        executor
            .execute(&summary, &session.standalone_rows, &cache, request)
            .await
    }
}

// 辅助方法
impl<C> DedupImporterImpl<C>
where
    C: DedupConfigReader,
{
    /// 从会话存档重建汇总：按存档映射重新映射原始行，按缓存行号重新合并
    fn replay_summary(
        &self,
        session: &ValidationSession,
        cache: &[crate::domain::validation::DuplicateCacheEntry],
    ) -> ImportResult<ValidationSummary> {
        let mut summary: ValidationSummary = serde_json::from_str(&session.summary_json)?;
        let rows: Vec<RawRow> = serde_json::from_str(&session.raw_rows_json)?;
        let mapping = FieldMapping::from_map(&session.field_mapping)?;

        let records: HashMap<usize, ContactRecord> = rows
            .iter()
            .map(|raw| (raw.row_number, mapping.map_row(raw).record))
            .collect();

        for group in summary.groups.iter_mut() {
            let row_numbers = cache
                .iter()
                .find(|c| c.duplicate_group_id == group.group_id)
                .map(|c| c.row_numbers.clone())
                .unwrap_or_else(|| group.row_numbers.clone());
            let members: Vec<ContactRecord> = row_numbers
                .iter()
                .filter_map(|n| records.get(n).cloned())
                .collect();
            match merge_internal_duplicates(&members) {
                Some(merged) => group.merged = merged,
                None => {
                    return Err(ImportError::InternalError(format!(
                        "分组 {} 的原始行缺失",
                        group.group_id
                    )))
                }
            }
        }

        for entry in summary.new_rows.iter_mut().filter(|r| r.group_id.is_none()) {
            if let Some(record) = records.get(&entry.row_number) {
                entry.record = record.clone();
            }
        }

        debug!(groups = summary.groups.len(), "汇总重放完成");
        Ok(summary)
    }
}

/// 配置错误归类: 存储读取失败 / 取值无法解析
fn config_error(key: &str, err: Box<dyn Error + Send + Sync>) -> ImportError {
    if err.is::<RepositoryError>() || err.is::<rusqlite::Error>() {
        ImportError::ConfigReadError {
            key: key.to_string(),
            message: err.to_string(),
        }
    } else {
        ImportError::ConfigValueError {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}
