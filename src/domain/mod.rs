// ==========================================
// 联系人导入去重系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod audit_log;
pub mod contact;
pub mod dedup;
pub mod types;
pub mod validation;

// 重导出核心类型
pub use audit_log::{AuditLogEntry, AuditLogFilter, AuditLogPage};
pub use contact::{Contact, ContactDraft, ContactField, ContactRecord};
pub use dedup::{
    DuplicateGroup, ExistingRecordMatch, FieldPreview, FieldSource, IdentifierConflict,
    MergedRow, NormalizedIdentifiers, RawRow,
};
pub use types::{
    AuditActionType, DecisionAction, DqLevel, DuplicateType, MatchKind, MergeStrategy,
    SessionStatus, UnknownStrategyError,
};
pub use validation::{
    AuditFailure, ConflictRowEntry, DecisionFailure, DecisionOutcome, DecisionStatus,
    DqViolation, DuplicateCacheEntry, DuplicateRowEntry, ExecuteRequest, ExecuteResult,
    GroupReport, InvalidRowEntry, MergeDecision, NewRowEntry, TagFailure, ValidationSession,
    ValidationSummary,
};
