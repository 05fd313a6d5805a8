// ==========================================
// 联系人导入去重系统 - 决策执行与审计
// ==========================================
// 职责: 按分组执行 新建 / 更新 / 跳过，写入成功后追加审计
// 红线: 单条决策失败不回滚其他决策
// 红线: 写入前必须重新做标识冲突检测（汇总可能已过期）
// 红线: 写入已提交后，审计或标签失败只记入结果，不丢弃逐条结果
// ==========================================
// 流程: 决策校验 → 合并(覆盖优先) → 冲突检测 → 写入 → 打标签 → 审计
// ==========================================

use crate::domain::audit_log::AuditLogEntry;
use crate::domain::contact::Contact;
use crate::domain::dedup::MergedRow;
use crate::domain::types::{AuditActionType, DecisionAction, MatchKind, MergeStrategy};
use crate::domain::validation::{
    AuditFailure, DecisionFailure, DecisionOutcome, DecisionStatus, DuplicateCacheEntry,
    ExecuteRequest, ExecuteResult, GroupReport, MergeDecision, TagFailure, ValidationSummary,
};
use crate::engine::conflict_detector::{describe_conflicts, ConflictDetector};
use crate::engine::merger::{apply_overrides, completeness_score, merge_group_with_existing};
use crate::engine::normalizer::draft_from_record;
use crate::importer::error::ImportResult;
use crate::repository::audit_log_repo::AuditLogRepository;
use crate::repository::contact_store::ContactStore;
use crate::repository::error::RepositoryError;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 单个分组待执行的动作
enum PlannedAction<'a> {
    Create { overrides: Option<&'a MergeDecision> },
    Update { target: i64, decision: &'a MergeDecision },
    Skip { explicit: bool },
    Reject(String),
}

pub struct DecisionExecutor {
    store: Arc<dyn ContactStore>,
    detector: ConflictDetector,
    audit_repo: Arc<AuditLogRepository>,
    default_strategy: MergeStrategy,
}

impl DecisionExecutor {
    pub fn new(
        store: Arc<dyn ContactStore>,
        audit_repo: Arc<AuditLogRepository>,
        default_strategy: MergeStrategy,
    ) -> Self {
        Self {
            detector: ConflictDetector::new(store.clone()),
            store,
            audit_repo,
            default_strategy,
        }
    }

    /// 执行全部决策
    ///
    /// # 说明
    /// - 分组按汇总顺序处理，随后处理无标识的独立新行
    /// - 引用未知分组的决策记为失败
    /// - 审计写入失败记入 `audit_failures`，打标签失败记入 `tag_failures`
    pub async fn execute(
        &self,
        summary: &ValidationSummary,
        standalone_rows: &[usize],
        cache: &[DuplicateCacheEntry],
        request: &ExecuteRequest,
    ) -> ImportResult<ExecuteResult> {
        let cache_by_group: HashMap<&str, &DuplicateCacheEntry> = cache
            .iter()
            .map(|c| (c.duplicate_group_id.as_str(), c))
            .collect();

        let mut decisions: HashMap<&str, &MergeDecision> = HashMap::new();
        let mut result = ExecuteResult {
            validation_id: summary.validation_id.clone(),
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            outcomes: Vec::new(),
            audit_ids: Vec::new(),
            audit_failures: Vec::new(),
            tag_failures: Vec::new(),
        };

        for decision in &request.decisions {
            let known = summary.group(&decision.group_id).is_some();
            if !known || decisions.contains_key(decision.group_id.as_str()) {
                let message = if known {
                    format!("分组 {} 有多条决策", decision.group_id)
                } else {
                    format!("未知分组: {}", decision.group_id)
                };
                warn!(group_id = %decision.group_id, %message, "决策无效");
                self.record(&mut result, DecisionOutcome {
                    group_id: Some(decision.group_id.clone()),
                    row_numbers: Vec::new(),
                    status: DecisionStatus::Failed,
                    contact_id: None,
                    failure: Some(DecisionFailure::InvalidDecision { message }),
                });
                continue;
            }
            decisions.insert(decision.group_id.as_str(), decision);
        }

        let mut touched_contacts: Vec<i64> = Vec::new();

        // ===== 分组 =====
        for group in &summary.groups {
            let decision = decisions.get(group.group_id.as_str()).copied();
            let cached = cache_by_group.get(group.group_id.as_str()).copied();
            let action = Self::plan(group, cached, decision);

            let outcome = match action {
                PlannedAction::Skip { explicit } => {
                    debug!(group_id = %group.group_id, explicit, "跳过分组");
                    DecisionOutcome {
                        group_id: Some(group.group_id.clone()),
                        row_numbers: group.row_numbers.clone(),
                        status: DecisionStatus::Skipped,
                        contact_id: None,
                        failure: None,
                    }
                }
                PlannedAction::Reject(message) => DecisionOutcome {
                    group_id: Some(group.group_id.clone()),
                    row_numbers: group.row_numbers.clone(),
                    status: DecisionStatus::Failed,
                    contact_id: None,
                    failure: Some(DecisionFailure::InvalidDecision { message }),
                },
                PlannedAction::Create { overrides } => {
                    let mut merged = group.merged.clone();
                    if let Some(d) = overrides {
                        apply_overrides(&mut merged, &d.overrides);
                    }
                    self.outcome_of(group, self.write(None, &merged).await, DecisionStatus::Created)
                }
                PlannedAction::Update { target, decision } => {
                    let strategy = decision.strategy.unwrap_or(self.default_strategy);
                    let written = match self.load_target(target).await {
                        Ok(existing) => {
                            let mut merged = merge_group_with_existing(&group.merged, &existing, strategy);
                            apply_overrides(&mut merged, &decision.overrides);
                            self.write(Some(target), &merged).await
                        }
                        Err(failure) => Err(failure),
                    };
                    self.outcome_of(group, written, DecisionStatus::Updated)
                }
            };

            if let Some(contact_id) = outcome.contact_id {
                touched_contacts.push(contact_id);
            }

            // 审计: 只为显式决策且未失败的记录写 decision 条目
            if let Some(d) = decision {
                if outcome.status != DecisionStatus::Failed {
                    let entry = AuditLogEntry::new(
                        Some(summary.validation_id.clone()),
                        &request.user_id,
                        AuditActionType::Decision,
                    )
                    .with_group(Some(group.group_id.clone()))
                    .with_decision(d.action.as_str())
                    .with_rows_affected(group.row_numbers.len() as i64)
                    .with_details(&json!({
                        "status": outcome.status,
                        "contact_id": outcome.contact_id,
                        "target_contact_id": d.target_contact_id,
                        "strategy": d.strategy.unwrap_or(self.default_strategy),
                        "overrides": d.overrides,
                        "classification": group.classification,
                    }));
                    self.append_audit(&mut result, entry);
                }
            }

            self.record(&mut result, outcome);
        }

        // ===== 无标识的独立新行 =====
        for row_number in standalone_rows {
            let record = match summary
                .new_rows
                .iter()
                .find(|r| r.row_number == *row_number && r.group_id.is_none())
            {
                Some(entry) => entry.record.clone(),
                None => continue,
            };
            let merged = MergedRow {
                completeness: completeness_score(&record),
                provenance: Default::default(),
                source_rows: vec![*row_number],
                record,
            };
            let outcome = match self.write(None, &merged).await {
                Ok(contact) => DecisionOutcome {
                    group_id: None,
                    row_numbers: vec![*row_number],
                    status: DecisionStatus::Created,
                    contact_id: Some(contact.id),
                    failure: None,
                },
                Err(failure) => DecisionOutcome {
                    group_id: None,
                    row_numbers: vec![*row_number],
                    status: DecisionStatus::Failed,
                    contact_id: None,
                    failure: Some(failure),
                },
            };
            if let Some(contact_id) = outcome.contact_id {
                touched_contacts.push(contact_id);
            }
            self.record(&mut result, outcome);
        }

        // ===== 标签 =====
        if !request.tag_ids.is_empty() && !touched_contacts.is_empty() {
            let mut links_added = 0usize;
            let mut tagged: Vec<i64> = Vec::new();
            for contact_id in &touched_contacts {
                match self.store.add_tags(*contact_id, &request.tag_ids).await {
                    Ok(n) => {
                        links_added += n;
                        tagged.push(*contact_id);
                    }
                    Err(e) => {
                        warn!(contact_id, error = %e, "打标签失败");
                        result.tag_failures.push(TagFailure {
                            contact_id: *contact_id,
                            message: e.to_string(),
                        });
                    }
                }
            }
            let failed_ids: Vec<i64> = result.tag_failures.iter().map(|f| f.contact_id).collect();
            let entry = AuditLogEntry::new(
                Some(summary.validation_id.clone()),
                &request.user_id,
                AuditActionType::BulkAction,
            )
            .with_decision("tag")
            .with_rows_affected(tagged.len() as i64)
            .with_details(&json!({
                "tag_ids": request.tag_ids,
                "contact_ids": tagged,
                "failed_contact_ids": failed_ids,
                "links_added": links_added,
            }));
            self.append_audit(&mut result, entry);
        }

        // ===== 导入汇总审计 =====
        let entry = AuditLogEntry::new(
            Some(summary.validation_id.clone()),
            &request.user_id,
            AuditActionType::Import,
        )
        .with_rows_affected((result.created + result.updated) as i64)
        .with_details(&json!({
            "total_rows": summary.total_rows,
            "created": result.created,
            "updated": result.updated,
            "skipped": result.skipped,
            "failed": result.failed,
            "tag_failures": result.tag_failures.len(),
            "audit_failures": result.audit_failures.len(),
        }));
        self.append_audit(&mut result, entry);

        info!(
            validation_id = %summary.validation_id,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed,
            audit_failures = result.audit_failures.len(),
            tag_failures = result.tag_failures.len(),
            "决策执行完成"
        );

        Ok(result)
    }

    /// 根据分组归类与决策确定动作
    fn plan<'a>(
        group: &GroupReport,
        cached: Option<&DuplicateCacheEntry>,
        decision: Option<&'a MergeDecision>,
    ) -> PlannedAction<'a> {
        let candidates: &[i64] = cached
            .map(|c| c.candidate_contact_ids.as_slice())
            .unwrap_or(group.candidate_contact_ids.as_slice());

        match (group.classification, decision) {
            (_, Some(d)) if d.action == DecisionAction::Skip => PlannedAction::Skip { explicit: true },

            (MatchKind::None, None) => PlannedAction::Create { overrides: None },
            (MatchKind::None, Some(d)) => match d.target_contact_id {
                None => PlannedAction::Create { overrides: Some(d) },
                Some(id) => PlannedAction::Reject(format!(
                    "分组 {} 没有匹配的已有联系人，不能更新 #{}",
                    group.group_id, id
                )),
            },

            (MatchKind::Single, None) | (MatchKind::Multiple, None) => {
                PlannedAction::Skip { explicit: false }
            }

            (MatchKind::Single, Some(d)) => {
                let default_target = cached
                    .and_then(|c| c.existing_contact_id)
                    .or_else(|| candidates.first().copied());
                match d.target_contact_id.or(default_target) {
                    Some(target) if candidates.contains(&target) => {
                        PlannedAction::Update { target, decision: d }
                    }
                    Some(target) => PlannedAction::Reject(format!(
                        "目标 #{} 不是分组 {} 的匹配联系人",
                        target, group.group_id
                    )),
                    None => PlannedAction::Reject(format!("分组 {} 缺少更新目标", group.group_id)),
                }
            }

            (MatchKind::Multiple, Some(d)) => match d.target_contact_id {
                Some(target) if candidates.contains(&target) => {
                    PlannedAction::Update { target, decision: d }
                }
                Some(target) => PlannedAction::Reject(format!(
                    "目标 #{} 不在分组 {} 的候选联系人中",
                    target, group.group_id
                )),
                None => PlannedAction::Reject(format!(
                    "分组 {} 匹配到多个联系人，必须指定 target_contact_id",
                    group.group_id
                )),
            },
        }
    }

    async fn load_target(&self, target: i64) -> Result<Contact, DecisionFailure> {
        match self.store.get_by_id(target).await {
            Ok(Some(contact)) if contact.is_live() => Ok(contact),
            Ok(_) => Err(DecisionFailure::TargetNotFound { contact_id: target }),
            Err(e) => Err(DecisionFailure::Store { message: e.to_string() }),
        }
    }

    /// 冲突检测后写入（新建或更新）
    async fn write(&self, target: Option<i64>, merged: &MergedRow) -> Result<Contact, DecisionFailure> {
        let draft = draft_from_record(&merged.record);

        let conflicts = self
            .detector
            .detect_identifier_conflicts(target, &draft)
            .await
            .map_err(|e| DecisionFailure::Store { message: e.to_string() })?;
        if !conflicts.is_empty() {
            return Err(DecisionFailure::IdentifierConflict {
                message: describe_conflicts(&conflicts),
                conflicts,
            });
        }

        let written = match target {
            None => self.store.create(&draft).await,
            Some(id) => self.store.update(id, &draft).await,
        };

        written.map_err(|e| match e {
            // 检测与写入之间被并发写入抢占
            RepositoryError::UniqueConstraintViolation(message) => DecisionFailure::IdentifierConflict {
                conflicts: Vec::new(),
                message,
            },
            RepositoryError::NotFound { .. } => DecisionFailure::TargetNotFound {
                contact_id: target.unwrap_or_default(),
            },
            other => DecisionFailure::Store { message: other.to_string() },
        })
    }

    fn outcome_of(
        &self,
        group: &GroupReport,
        written: Result<Contact, DecisionFailure>,
        success: DecisionStatus,
    ) -> DecisionOutcome {
        match written {
            Ok(contact) => DecisionOutcome {
                group_id: Some(group.group_id.clone()),
                row_numbers: group.row_numbers.clone(),
                status: success,
                contact_id: Some(contact.id),
                failure: None,
            },
            Err(failure) => {
                warn!(group_id = %group.group_id, ?failure, "分组写入失败");
                DecisionOutcome {
                    group_id: Some(group.group_id.clone()),
                    row_numbers: group.row_numbers.clone(),
                    status: DecisionStatus::Failed,
                    contact_id: None,
                    failure: Some(failure),
                }
            }
        }
    }

    /// 追加一条审计；失败时记入结果，不中断执行
    fn append_audit(&self, result: &mut ExecuteResult, entry: AuditLogEntry) {
        match self.audit_repo.insert(&entry) {
            Ok(audit_id) => result.audit_ids.push(audit_id),
            Err(e) => {
                error!(
                    action_type = entry.action_type.as_str(),
                    group_id = ?entry.duplicate_group_id,
                    error = %e,
                    "审计写入失败"
                );
                result.audit_failures.push(AuditFailure {
                    action_type: entry.action_type,
                    group_id: entry.duplicate_group_id,
                    message: e.to_string(),
                });
            }
        }
    }

    fn record(&self, result: &mut ExecuteResult, outcome: DecisionOutcome) {
        match outcome.status {
            DecisionStatus::Created => result.created += 1,
            DecisionStatus::Updated => result.updated += 1,
            DecisionStatus::Skipped => result.skipped += 1,
            DecisionStatus::Failed => result.failed += 1,
        }
        result.outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory_shared, SharedConnection};
    use crate::domain::contact::ContactRecord;
    use crate::engine::grouper::DuplicateGrouper;
    use crate::engine::matcher::ExternalMatcher;
    use crate::importer::summary_builder::{BuiltSummary, RowAssessment, SummaryBuilder};
    use crate::domain::contact::ContactDraft;
    use crate::repository::contact_repo_impl::ContactRepositoryImpl;
    use crate::repository::error::RepositoryResult;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        conn: SharedConnection,
        store: Arc<dyn ContactStore>,
        audit_repo: Arc<AuditLogRepository>,
        executor: DecisionExecutor,
    }

    /// 存储替身: 查询看不到已有标识（模拟检测之后的并发写入），
    /// 写入指定邮箱时由唯一索引拒绝，可让第一次打标签失败
    struct RacingStore {
        inner: ContactRepositoryImpl,
        taken_email: Option<String>,
        fail_first_tagging: AtomicBool,
    }

    #[async_trait]
    impl ContactStore for RacingStore {
        async fn find_active_by_identifiers(
            &self,
            _emails: &[String],
            _phones: &[String],
        ) -> RepositoryResult<Vec<Contact>> {
            Ok(Vec::new())
        }

        async fn find_active_by_email(&self, _email: &str, _exclude_id: Option<i64>) -> RepositoryResult<Option<Contact>> {
            Ok(None)
        }

        async fn find_active_by_phone(&self, _phone: &str, _exclude_id: Option<i64>) -> RepositoryResult<Option<Contact>> {
            Ok(None)
        }

        async fn get_by_id(&self, id: i64) -> RepositoryResult<Option<Contact>> {
            self.inner.get_by_id(id).await
        }

        async fn create(&self, draft: &ContactDraft) -> RepositoryResult<Contact> {
            if self.taken_email.is_some() && draft.email == self.taken_email {
                return Err(RepositoryError::UniqueConstraintViolation(
                    "UNIQUE constraint failed: contacts.email".to_string(),
                ));
            }
            self.inner.create(draft).await
        }

        async fn update(&self, id: i64, draft: &ContactDraft) -> RepositoryResult<Contact> {
            self.inner.update(id, draft).await
        }

        async fn add_tags(&self, contact_id: i64, tag_ids: &[i64]) -> RepositoryResult<usize> {
            if self.fail_first_tagging.swap(false, Ordering::SeqCst) {
                return Err(RepositoryError::DatabaseQueryError("disk I/O error".to_string()));
            }
            self.inner.add_tags(contact_id, tag_ids).await
        }
    }

    fn fixture() -> Fixture {
        fixture_with(|conn| Arc::new(ContactRepositoryImpl::new(conn)))
    }

    fn racing_fixture(taken_email: Option<&str>, fail_first_tagging: bool) -> Fixture {
        let taken_email = taken_email.map(str::to_string);
        fixture_with(move |conn| {
            Arc::new(RacingStore {
                inner: ContactRepositoryImpl::new(conn),
                taken_email,
                fail_first_tagging: AtomicBool::new(fail_first_tagging),
            })
        })
    }

    fn fixture_with(make_store: impl FnOnce(SharedConnection) -> Arc<dyn ContactStore>) -> Fixture {
        let conn = open_in_memory_shared().unwrap();
        let store = make_store(conn.clone());
        let audit_repo = Arc::new(AuditLogRepository::new(conn.clone()));
        let executor = DecisionExecutor::new(store.clone(), audit_repo.clone(), MergeStrategy::CsvPriority);
        Fixture {
            conn,
            store,
            audit_repo,
            executor,
        }
    }

    fn record(n: usize, pairs: &[(&str, &str)]) -> ContactRecord {
        let mut r = ContactRecord::new(n);
        for (k, v) in pairs {
            r.set_value(k, Some(v.to_string()));
        }
        r
    }

    async fn seed(f: &Fixture, pairs: &[(&str, &str)]) -> Contact {
        f.store.create(&draft_from_record(&record(0, pairs))).await.unwrap()
    }

    async fn prepare(f: &Fixture, rows: Vec<ContactRecord>) -> BuiltSummary {
        let groups = DuplicateGrouper::new().group(&rows);
        let matches = ExternalMatcher::new(f.store.clone()).match_groups(&groups).await.unwrap();
        let assessments: Vec<RowAssessment> = rows
            .into_iter()
            .map(|record| RowAssessment {
                record,
                violations: vec![],
            })
            .collect();
        SummaryBuilder::build("v1", &assessments, &groups, &matches)
    }

    fn request(decisions: Vec<MergeDecision>, tag_ids: Vec<i64>) -> ExecuteRequest {
        ExecuteRequest {
            validation_id: "v1".to_string(),
            user_id: "u1".to_string(),
            field_mapping: BTreeMap::new(),
            decisions,
            tag_ids,
        }
    }

    async fn run(f: &Fixture, built: &BuiltSummary, req: &ExecuteRequest) -> ExecuteResult {
        f.executor
            .execute(&built.summary, &built.standalone_rows, &built.cache_entries, req)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_groups_and_standalone_rows_are_created() {
        let f = fixture();
        let built = prepare(
            &f,
            vec![
                record(1, &[("email", "a@x.com"), ("first_name", "Ann")]),
                record(2, &[("email", "A@X.com"), ("phone", "555-123-4567")]),
                record(3, &[("first_name", "NoIds"), ("company", "Acme")]),
            ],
        )
        .await;

        let result = run(&f, &built, &request(vec![], vec![])).await;

        assert_eq!(result.created, 2);
        assert_eq!(result.failed, 0);
        let merged = f
            .store
            .find_active_by_email("a@x.com", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.first_name.as_deref(), Some("Ann"));
        assert_eq!(merged.normalized_phone.as_deref(), Some("+15551234567"));

        // 无显式决策: 只有导入汇总
        assert_eq!(result.audit_ids.len(), 1);
        let entries = f.audit_repo.find_by_validation_id("v1").unwrap();
        assert_eq!(entries[0].action_type, AuditActionType::Import);
        assert_eq!(entries[0].rows_affected, 2);
    }

    #[tokio::test]
    async fn test_single_match_update_uses_cached_target() {
        let f = fixture();
        let existing = seed(&f, &[("email", "k@x.com"), ("first_name", "Old"), ("city", "Paris")]).await;
        let built = prepare(&f, vec![record(1, &[("email", "k@x.com"), ("first_name", "New")])]).await;

        let result = run(&f, &built, &request(vec![MergeDecision::update("grp_0001", None)], vec![])).await;

        assert_eq!(result.updated, 1);
        assert_eq!(result.outcomes[0].contact_id, Some(existing.id));
        let after = f.store.get_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(after.first_name.as_deref(), Some("New"));
        assert_eq!(after.city.as_deref(), Some("Paris"));

        let entries = f.audit_repo.find_by_validation_id("v1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action_type, AuditActionType::Decision);
        assert_eq!(entries[0].decision.as_deref(), Some("update"));
        assert_eq!(entries[0].duplicate_group_id.as_deref(), Some("grp_0001"));
    }

    #[tokio::test]
    async fn test_fill_empty_strategy_and_overrides() {
        let f = fixture();
        let existing = seed(&f, &[("email", "k@x.com"), ("first_name", "Old")]).await;
        let built = prepare(
            &f,
            vec![record(1, &[("email", "k@x.com"), ("first_name", "New"), ("company", "Acme")])],
        )
        .await;

        let mut decision = MergeDecision::update("grp_0001", Some(existing.id));
        decision.strategy = Some(MergeStrategy::FillEmpty);
        decision.overrides.insert("job_title".to_string(), Some("CTO".to_string()));
        let result = run(&f, &built, &request(vec![decision], vec![])).await;

        assert_eq!(result.updated, 1);
        let after = f.store.get_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(after.first_name.as_deref(), Some("Old"));
        assert_eq!(after.company.as_deref(), Some("Acme"));
        assert_eq!(after.job_title.as_deref(), Some("CTO"));
    }

    #[tokio::test]
    async fn test_undecided_single_is_skipped_and_explicit_skip_is_audited() {
        let f = fixture();
        seed(&f, &[("email", "k@x.com")]).await;
        seed(&f, &[("email", "j@x.com")]).await;
        let built = prepare(
            &f,
            vec![record(1, &[("email", "k@x.com")]), record(2, &[("email", "j@x.com")])],
        )
        .await;

        let result = run(&f, &built, &request(vec![MergeDecision::skip("grp_0002")], vec![])).await;

        assert_eq!(result.skipped, 2);
        let entries = f.audit_repo.find_by_validation_id("v1").unwrap();
        let decisions: Vec<_> = entries
            .iter()
            .filter(|e| e.action_type == AuditActionType::Decision)
            .collect();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision.as_deref(), Some("skip"));
    }

    #[tokio::test]
    async fn test_multiple_match_requires_candidate_target() {
        let f = fixture();
        let a = seed(&f, &[("email", "a@x.com")]).await;
        let b = seed(&f, &[("phone", "5550001111")]).await;
        let rows = vec![
            record(1, &[("email", "a@x.com"), ("phone", "555-000-1111")]),
            record(2, &[("email", "fresh@x.com")]),
        ];

        // 未指定目标: 失败，但不影响其他分组
        let built = prepare(&f, rows.clone()).await;
        let result = run(&f, &built, &request(vec![MergeDecision::update("grp_0001", None)], vec![])).await;
        assert_eq!(result.failed, 1);
        assert_eq!(result.created, 1);
        assert!(matches!(
            result.outcomes[0].failure,
            Some(DecisionFailure::InvalidDecision { .. })
        ));

        // 目标不在候选中
        let built = prepare(&f, vec![rows[0].clone()]).await;
        let result = run(&f, &built, &request(vec![MergeDecision::update("grp_0001", Some(999))], vec![])).await;
        assert_eq!(result.failed, 1);

        // 指定候选之一: 另一候选仍占用电话，写入被冲突检测拦截
        let result = run(&f, &built, &request(vec![MergeDecision::update("grp_0001", Some(a.id))], vec![])).await;
        match &result.outcomes[0].failure {
            Some(DecisionFailure::IdentifierConflict { conflicts, .. }) => {
                assert_eq!(conflicts[0].contact_id, b.id);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_group_decision_fails_alone() {
        let f = fixture();
        let built = prepare(&f, vec![record(1, &[("email", "a@x.com")])]).await;

        let result = run(&f, &built, &request(vec![MergeDecision::skip("grp_9999")], vec![])).await;

        assert_eq!(result.failed, 1);
        assert_eq!(result.created, 1);
        assert_eq!(result.outcomes[0].group_id.as_deref(), Some("grp_9999"));
    }

    #[tokio::test]
    async fn test_identifier_taken_after_validation_is_reported() {
        let f = fixture();
        let built = prepare(
            &f,
            vec![record(1, &[("email", "race@x.com")]), record(2, &[("email", "ok@x.com")])],
        )
        .await;
        // 校验之后其他会话写入了同一邮箱
        let rival = seed(&f, &[("email", "race@x.com"), ("first_name", "Rival")]).await;

        let result = run(&f, &built, &request(vec![], vec![])).await;

        assert_eq!(result.created, 1);
        assert_eq!(result.failed, 1);
        match &result.outcomes[0].failure {
            Some(DecisionFailure::IdentifierConflict { conflicts, message }) => {
                assert_eq!(conflicts[0].contact_id, rival.id);
                assert!(message.contains("race@x.com"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_soft_deleted_target_is_not_found() {
        let f = fixture();
        let existing = seed(&f, &[("email", "k@x.com")]).await;
        let built = prepare(&f, vec![record(1, &[("email", "k@x.com")])]).await;

        f.conn
            .lock()
            .unwrap()
            .execute("UPDATE contacts SET is_deleted = 1 WHERE id = ?1", [existing.id])
            .unwrap();

        let result = run(&f, &built, &request(vec![MergeDecision::update("grp_0001", None)], vec![])).await;

        assert_eq!(result.failed, 1);
        assert_eq!(
            result.outcomes[0].failure,
            Some(DecisionFailure::TargetNotFound { contact_id: existing.id })
        );
        // 失败的决策不写 decision 审计
        let entries = f.audit_repo.find_by_validation_id("v1").unwrap();
        assert!(entries.iter().all(|e| e.action_type == AuditActionType::Import));
    }

    #[tokio::test]
    async fn test_tags_are_attached_and_audited() {
        let f = fixture();
        let built = prepare(&f, vec![record(1, &[("email", "a@x.com")])]).await;

        let result = run(&f, &built, &request(vec![], vec![7, 8])).await;

        assert_eq!(result.created, 1);
        assert_eq!(result.audit_ids.len(), 2);
        let bulk = f.audit_repo.find_by_id(&result.audit_ids[0]).unwrap().unwrap();
        assert_eq!(bulk.action_type, AuditActionType::BulkAction);
        assert_eq!(bulk.decision.as_deref(), Some("tag"));
    }

    #[tokio::test]
    async fn test_unique_index_race_is_identifier_conflict() {
        let f = racing_fixture(Some("race@x.com"), false);
        let built = prepare(
            &f,
            vec![record(1, &[("email", "race@x.com")]), record(2, &[("email", "ok@x.com")])],
        )
        .await;

        let result = run(&f, &built, &request(vec![], vec![])).await;

        assert_eq!(result.failed, 1);
        assert_eq!(result.created, 1);
        match &result.outcomes[0].failure {
            Some(DecisionFailure::IdentifierConflict { conflicts, message }) => {
                assert!(conflicts.is_empty());
                assert!(message.contains("UNIQUE"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // 同批其他分组照常提交
        let sibling = result.outcomes[1].contact_id.unwrap();
        let created = f.store.get_by_id(sibling).await.unwrap().unwrap();
        assert_eq!(created.email.as_deref(), Some("ok@x.com"));
    }

    #[tokio::test]
    async fn test_audit_failure_keeps_committed_outcomes() {
        let f = fixture();
        let built = prepare(
            &f,
            vec![record(1, &[("email", "a@x.com")]), record(2, &[("email", "b@x.com")])],
        )
        .await;
        f.conn.lock().unwrap().execute_batch("DROP TABLE audit_log").unwrap();

        let result = run(&f, &built, &request(vec![MergeDecision::skip("grp_0002")], vec![])).await;

        assert_eq!(result.created, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.outcomes[0].status, DecisionStatus::Created);
        assert!(result.outcomes[0].contact_id.is_some());
        assert!(result.audit_ids.is_empty());

        let kinds: Vec<_> = result
            .audit_failures
            .iter()
            .map(|a| (a.action_type, a.group_id.as_deref()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (AuditActionType::Decision, Some("grp_0002")),
                (AuditActionType::Import, None),
            ]
        );
        assert!(result.audit_failures[0].message.contains("audit_log"));
    }

    #[tokio::test]
    async fn test_tag_failure_is_reported_per_contact() {
        let f = racing_fixture(None, true);
        let built = prepare(
            &f,
            vec![record(1, &[("email", "a@x.com")]), record(2, &[("email", "b@x.com")])],
        )
        .await;

        let result = run(&f, &built, &request(vec![], vec![7])).await;

        assert_eq!(result.created, 2);
        assert_eq!(result.failed, 0);
        let first = result.outcomes[0].contact_id.unwrap();
        let second = result.outcomes[1].contact_id.unwrap();
        assert_eq!(result.tag_failures.len(), 1);
        assert_eq!(result.tag_failures[0].contact_id, first);

        let bulk = f.audit_repo.find_by_id(&result.audit_ids[0]).unwrap().unwrap();
        assert_eq!(bulk.action_type, AuditActionType::BulkAction);
        assert_eq!(bulk.rows_affected, 1);
        let details = bulk.details_json.unwrap();
        assert_eq!(details["contact_ids"], json!([second]));
        assert_eq!(details["failed_contact_ids"], json!([first]));
    }
}
