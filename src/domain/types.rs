// ==========================================
// 联系人导入去重系统 - 领域类型定义
// ==========================================
// 依据: 各表状态字段取值
// 红线: 合并策略为封闭枚举,不接受运行时字符串兜底
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ==========================================
// 合并策略 (Merge Strategy)
// ==========================================
// CsvPriority: 导入值非空即覆盖
// FillEmpty: 导入值只补空缺
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    CsvPriority,
    FillEmpty,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::CsvPriority => "csv_priority",
            MergeStrategy::FillEmpty => "fill_empty",
        }
    }
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::CsvPriority
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 未知合并策略名称（编程错误，不是行级校验失败）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("未知合并策略: {0}（应为 csv_priority / fill_empty）")]
pub struct UnknownStrategyError(pub String);

impl FromStr for MergeStrategy {
    type Err = UnknownStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "csv_priority" => Ok(MergeStrategy::CsvPriority),
            "fill_empty" => Ok(MergeStrategy::FillEmpty),
            other => Err(UnknownStrategyError(other.to_string())),
        }
    }
}

// ==========================================
// 外部匹配分类 (Match Kind)
// ==========================================
// None: 新记录 / Single: 可合并候选 / Multiple: 冲突,必须人工处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    None,
    Single,
    Multiple,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::None => "none",
            MatchKind::Single => "single",
            MatchKind::Multiple => "multiple",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(MatchKind::None),
            "single" => Some(MatchKind::Single),
            "multiple" => Some(MatchKind::Multiple),
            _ => None,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 重复类型 (Duplicate Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateType {
    Internal, // 仅同批次内重复
    External, // 命中库中唯一一条活跃记录
}

// ==========================================
// 人工决策动作 (Decision Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Update,
    Skip,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Update => "update",
            DecisionAction::Skip => "skip",
        }
    }
}

// ==========================================
// 审计动作类型 (Audit Action Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActionType {
    Decision,   // 单个分组的人工决策
    Import,     // 一次执行的导入汇总
    BulkAction, // 批量动作（打标签等）
}

impl AuditActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditActionType::Decision => "decision",
            AuditActionType::Import => "import",
            AuditActionType::BulkAction => "bulk_action",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(AuditActionType::Decision),
            "import" => Some(AuditActionType::Import),
            "bulk_action" => Some(AuditActionType::BulkAction),
            _ => None,
        }
    }
}

impl fmt::Display for AuditActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 校验会话状态 (Session Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Validated,
    Executed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Validated => "VALIDATED",
            SessionStatus::Executed => "EXECUTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VALIDATED" => Some(SessionStatus::Validated),
            "EXECUTED" => Some(SessionStatus::Executed),
            _ => None,
        }
    }
}

// ==========================================
// DqLevel - 数据质量级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DqLevel {
    Error,    // 错误（进入 invalid_rows）
    Warning,  // 警告（允许导入）
    Info,     // 提示（仅记录）
    Conflict, // 身份相关冲突（进入 conflict_rows）
}
