// ==========================================
// 联系人导入去重系统 - 去重领域模型
// ==========================================
// 依据: 导入去重流程中间结果
// ==========================================

use crate::domain::contact::{Contact, ContactField, ContactRecord};
use crate::domain::types::MatchKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// RawRow - 解析后的原始行
// ==========================================
// 生命周期: 仅存在于单次导入会话
// 说明: cells 保持列顺序；None 表示单元格为空/NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: Vec<(String, Option<String>)>,
}

impl RawRow {
    pub fn new(row_number: usize, cells: Vec<(String, Option<String>)>) -> Self {
        Self { row_number, cells }
    }

    /// 便捷构造（测试/API 直接传入 (列名, 值) 对）
    pub fn from_pairs(row_number: usize, pairs: &[(&str, &str)]) -> Self {
        Self {
            row_number,
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }
}

// ==========================================
// NormalizedIdentifiers - 规范化身份标识
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedIdentifiers {
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
}

impl NormalizedIdentifiers {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty()
    }

    pub fn extend(&mut self, other: &NormalizedIdentifiers) {
        self.emails.extend(other.emails.iter().cloned());
        self.phones.extend(other.phones.iter().cloned());
    }

    /// 是否与库中联系人共享任一标识
    pub fn matches_contact(&self, contact: &Contact) -> bool {
        contact
            .email
            .as_ref()
            .map(|e| self.emails.contains(e))
            .unwrap_or(false)
            || contact
                .normalized_phone
                .as_ref()
                .map(|p| self.phones.contains(p))
                .unwrap_or(false)
    }
}

// ==========================================
// DuplicateGroup - 批次内重复分组
// ==========================================
// 不变量: 非空；每行至多属于一个分组；不跨导入持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub group_id: String,
    pub row_numbers: Vec<usize>,
    pub identifiers: NormalizedIdentifiers,
}

impl DuplicateGroup {
    /// 是否存在同批次内的重复伙伴
    pub fn has_internal_duplicates(&self) -> bool {
        self.row_numbers.len() > 1
    }
}

// ==========================================
// ExistingRecordMatch - 外部匹配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "contacts", rename_all = "snake_case")]
pub enum ExistingRecordMatch {
    None,
    Single(Contact),
    Multiple(Vec<Contact>),
}

impl ExistingRecordMatch {
    /// 由查询结果构造（调用方保证已按 id 去重）
    pub fn from_contacts(mut contacts: Vec<Contact>) -> Self {
        match contacts.len() {
            0 => ExistingRecordMatch::None,
            1 => ExistingRecordMatch::Single(contacts.remove(0)),
            _ => ExistingRecordMatch::Multiple(contacts),
        }
    }

    pub fn kind(&self) -> MatchKind {
        match self {
            ExistingRecordMatch::None => MatchKind::None,
            ExistingRecordMatch::Single(_) => MatchKind::Single,
            ExistingRecordMatch::Multiple(_) => MatchKind::Multiple,
        }
    }

    pub fn contact_ids(&self) -> Vec<i64> {
        match self {
            ExistingRecordMatch::None => vec![],
            ExistingRecordMatch::Single(c) => vec![c.id],
            ExistingRecordMatch::Multiple(cs) => cs.iter().map(|c| c.id).collect(),
        }
    }
}

// ==========================================
// FieldSource - 字段来源（合并溯源）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum FieldSource {
    Row(usize),    // 导入行号
    Existing(i64), // 库中联系人 id
    Override,      // 人工覆盖
}

// ==========================================
// MergedRow - 合并结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRow {
    pub record: ContactRecord,
    pub provenance: BTreeMap<String, FieldSource>,
    pub completeness: usize,
    pub source_rows: Vec<usize>,
}

// ==========================================
// FieldPreview - 合并预览（逐字段对比）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPreview {
    pub field: String,
    pub csv_value: Option<String>,
    pub db_value: Option<String>,
    pub merged_value: Option<String>,
    pub changed: bool,
}

// ==========================================
// IdentifierConflict - 身份标识冲突
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConflict {
    pub field: ContactField,
    pub value: String,
    pub contact_id: i64,
    pub contact_name: String,
}
