// ==========================================
// 联系人导入去重系统 - 校验汇总与人工决策模型
// ==========================================
// 依据: validation_session / duplicate_cache 表
// 红线: 四个分区互斥,每行保留原始行号
// ==========================================

use crate::domain::contact::{ContactField, ContactRecord};
use crate::domain::dedup::{FieldPreview, IdentifierConflict, MergedRow};
use crate::domain::types::{AuditActionType, DecisionAction, DqLevel, DuplicateType, MatchKind, MergeStrategy, SessionStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// DqViolation - 数据质量违规
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DqViolation {
    pub row_number: usize, // 原始文件行号
    pub level: DqLevel,    // 违规级别
    pub field: String,     // 违规字段
    pub message: String,   // 违规描述
}

// ==========================================
// 汇总分区条目
// ==========================================

/// new_rows 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRowEntry {
    pub row_number: usize,
    pub group_id: Option<String>,
    pub record: ContactRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// duplicate_rows 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRowEntry {
    pub row_number: usize,
    pub group_id: String,
    pub duplicate_type: DuplicateType,
    pub existing_contact_id: Option<i64>,
    pub record: ContactRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// conflict_rows 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRowEntry {
    pub row_number: usize,
    pub group_id: Option<String>,
    pub candidate_contact_ids: Vec<i64>,
    pub reason: String,
    pub record: Option<ContactRecord>,
}

/// invalid_rows 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRowEntry {
    pub row_number: usize,
    pub errors: Vec<DqViolation>,
}

// ==========================================
// GroupReport - 分组审阅信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group_id: String,
    pub row_numbers: Vec<usize>,
    pub classification: MatchKind,
    pub candidate_contact_ids: Vec<i64>,
    pub merged: MergedRow,
    pub recommendation: String,
    /// 仅 single 匹配时提供：与库中记录的逐字段对比
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<FieldPreview>,
}

// ==========================================
// ValidationSummary - 批次校验汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub validation_id: String,
    pub total_rows: usize,
    pub new_rows: Vec<NewRowEntry>,
    pub duplicate_rows: Vec<DuplicateRowEntry>,
    pub conflict_rows: Vec<ConflictRowEntry>,
    pub invalid_rows: Vec<InvalidRowEntry>,
    pub groups: Vec<GroupReport>,
}

impl ValidationSummary {
    /// 全部分区中出现的行号（按分区顺序拼接，可用于互斥性检查）
    pub fn all_row_numbers(&self) -> Vec<usize> {
        self.new_rows
            .iter()
            .map(|r| r.row_number)
            .chain(self.duplicate_rows.iter().map(|r| r.row_number))
            .chain(self.conflict_rows.iter().map(|r| r.row_number))
            .chain(self.invalid_rows.iter().map(|r| r.row_number))
            .collect()
    }

    pub fn group(&self, group_id: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }
}

// ==========================================
// MergeDecision - 人工决策
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDecision {
    pub group_id: String,
    pub action: DecisionAction,
    #[serde(default)]
    pub target_contact_id: Option<i64>,
    /// 字段级覆盖，优先于自动合并结果（值为 None 表示清空该字段）
    #[serde(default)]
    pub overrides: BTreeMap<String, Option<String>>,
    /// 未指定时使用配置的默认策略
    #[serde(default)]
    pub strategy: Option<MergeStrategy>,
}

impl MergeDecision {
    pub fn skip(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            action: DecisionAction::Skip,
            target_contact_id: None,
            overrides: BTreeMap::new(),
            strategy: None,
        }
    }

    pub fn update(group_id: &str, target_contact_id: Option<i64>) -> Self {
        Self {
            group_id: group_id.to_string(),
            action: DecisionAction::Update,
            target_contact_id,
            overrides: BTreeMap::new(),
            strategy: None,
        }
    }
}

// ==========================================
// 执行结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Created,
    Updated,
    Skipped,
    Failed,
}

/// 单条决策失败原因（不影响同批其他决策）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionFailure {
    /// 标识已被其他活跃联系人占用（应用层检测或唯一索引兜底）
    IdentifierConflict {
        conflicts: Vec<IdentifierConflict>,
        message: String,
    },
    /// 目标联系人不存在或已失效
    TargetNotFound { contact_id: i64 },
    /// 决策本身不合法（未知分组、目标不在候选内等）
    InvalidDecision { message: String },
    /// 存储层错误
    Store { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// 分组 id；无标识的独立新行为 None
    pub group_id: Option<String>,
    pub row_numbers: Vec<usize>,
    pub status: DecisionStatus,
    pub contact_id: Option<i64>,
    pub failure: Option<DecisionFailure>,
}

/// 审计写入失败（对应的联系人写入已提交）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFailure {
    pub action_type: AuditActionType,
    pub group_id: Option<String>,
    pub message: String,
}

/// 打标签失败（联系人本身已写入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFailure {
    pub contact_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub validation_id: String,
    pub user_id: String,
    pub field_mapping: BTreeMap<String, String>,
    pub decisions: Vec<MergeDecision>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub validation_id: String,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<DecisionOutcome>,
    pub audit_ids: Vec<String>,
    #[serde(default)]
    pub audit_failures: Vec<AuditFailure>,
    #[serde(default)]
    pub tag_failures: Vec<TagFailure>,
}

// ==========================================
// 持久化: 校验会话 / 重复缓存
// ==========================================

/// 对齐: validation_session 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSession {
    pub validation_id: String,
    pub user_id: String,
    pub file_name: Option<String>,
    pub field_mapping: BTreeMap<String, String>,
    pub raw_rows_json: String,
    pub standalone_rows: Vec<usize>,
    pub summary_json: String,
    pub status: SessionStatus,
    pub created_at: NaiveDateTime,
}

/// 对齐: duplicate_cache 表，主键 (validation_id, duplicate_group_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCacheEntry {
    pub validation_id: String,
    pub duplicate_group_id: String,
    pub classification: MatchKind,
    pub existing_contact_id: Option<i64>,
    pub candidate_contact_ids: Vec<i64>,
    pub completeness_score: usize,
    pub recommendation: String,
    pub row_numbers: Vec<usize>,
}

/// 主标识字段（冲突检测只看主邮箱/主电话）
pub const PRIMARY_IDENTIFIER_FIELDS: [ContactField; 2] = [ContactField::Email, ContactField::Phone];
