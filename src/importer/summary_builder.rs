// ==========================================
// 联系人导入去重系统 - 校验汇总构建
// ==========================================
// 职责: 把映射/校验/分组/匹配结果汇总为四类行 + 分组报告
// 红线: 每一行恰好落入 new / duplicate / conflict / invalid 之一
// ==========================================

use crate::domain::contact::ContactRecord;
use crate::domain::dedup::{DuplicateGroup, ExistingRecordMatch, MergedRow};
use crate::domain::types::{DqLevel, DuplicateType, MatchKind};
use crate::domain::validation::{
    ConflictRowEntry, DqViolation, DuplicateCacheEntry, DuplicateRowEntry, GroupReport,
    InvalidRowEntry, NewRowEntry, ValidationSummary,
};
use crate::engine::merger::{merge_internal_duplicates, preview_merge};
use crate::importer::dq_validator::DqValidator;
use std::collections::{BTreeMap, HashMap};

/// 单行映射 + 校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAssessment {
    pub record: ContactRecord,
    pub violations: Vec<DqViolation>,
}

impl RowAssessment {
    pub fn row_number(&self) -> usize {
        self.record.row_number
    }

    pub fn is_invalid(&self) -> bool {
        DqValidator::has_errors(&self.violations)
    }

    pub fn has_mapping_conflict(&self) -> bool {
        self.violations.iter().any(|v| v.level == DqLevel::Conflict)
    }

    /// 可参与分组与匹配的行
    pub fn is_eligible(&self) -> bool {
        !self.is_invalid() && !self.has_mapping_conflict()
    }

    fn warnings(&self) -> Vec<String> {
        self.violations
            .iter()
            .filter(|v| v.level == DqLevel::Warning)
            .map(|v| v.message.clone())
            .collect()
    }
}

/// 分组建议
pub fn recommendation_for(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::None => "create",
        MatchKind::Single => "merge",
        MatchKind::Multiple => "manual_review",
    }
}

/// 构建结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltSummary {
    pub summary: ValidationSummary,
    /// 无标识的有效行（不属于任何分组，执行时直接新建）
    pub standalone_rows: Vec<usize>,
    pub cache_entries: Vec<DuplicateCacheEntry>,
}

pub struct SummaryBuilder;

impl SummaryBuilder {
    /// 构建校验汇总
    ///
    /// # 参数
    /// - assessments: 全部行（含无效行）
    /// - groups: 仅由可参与行构成的分组
    /// - matches: group_id → 外部匹配结果
    pub fn build(
        validation_id: &str,
        assessments: &[RowAssessment],
        groups: &[DuplicateGroup],
        matches: &BTreeMap<String, ExistingRecordMatch>,
    ) -> BuiltSummary {
        let by_row: HashMap<usize, &RowAssessment> =
            assessments.iter().map(|a| (a.row_number(), a)).collect();

        let mut summary = ValidationSummary {
            validation_id: validation_id.to_string(),
            total_rows: assessments.len(),
            new_rows: Vec::new(),
            duplicate_rows: Vec::new(),
            conflict_rows: Vec::new(),
            invalid_rows: Vec::new(),
            groups: Vec::new(),
        };
        let mut cache_entries = Vec::new();

        // ===== 1. 无效行 / 映射冲突行 =====
        for a in assessments {
            if a.is_invalid() {
                summary.invalid_rows.push(InvalidRowEntry {
                    row_number: a.row_number(),
                    errors: a
                        .violations
                        .iter()
                        .filter(|v| v.level == DqLevel::Error)
                        .cloned()
                        .collect(),
                });
            } else if a.has_mapping_conflict() {
                summary.conflict_rows.push(ConflictRowEntry {
                    row_number: a.row_number(),
                    group_id: None,
                    candidate_contact_ids: Vec::new(),
                    reason: a
                        .violations
                        .iter()
                        .filter(|v| v.level == DqLevel::Conflict)
                        .map(|v| v.message.clone())
                        .collect::<Vec<_>>()
                        .join("; "),
                    record: Some(a.record.clone()),
                });
            }
        }

        // ===== 2. 分组行 =====
        let mut grouped_rows: Vec<usize> = Vec::new();
        for group in groups {
            let members: Vec<&RowAssessment> = group
                .row_numbers
                .iter()
                .filter_map(|n| by_row.get(n).copied())
                .collect();
            let records: Vec<ContactRecord> = members.iter().map(|a| a.record.clone()).collect();
            let merged: MergedRow = match merge_internal_duplicates(&records) {
                Some(m) => m,
                None => continue,
            };
            grouped_rows.extend(group.row_numbers.iter().copied());

            let existing = matches.get(&group.group_id).cloned().unwrap_or(ExistingRecordMatch::None);
            let kind = existing.kind();
            let candidate_ids = existing.contact_ids();

            match &existing {
                ExistingRecordMatch::None if !group.has_internal_duplicates() => {
                    for a in &members {
                        summary.new_rows.push(NewRowEntry {
                            row_number: a.row_number(),
                            group_id: Some(group.group_id.clone()),
                            record: a.record.clone(),
                            warnings: a.warnings(),
                        });
                    }
                }
                ExistingRecordMatch::None | ExistingRecordMatch::Single(_) => {
                    let (duplicate_type, existing_id) = match &existing {
                        ExistingRecordMatch::Single(c) => (DuplicateType::External, Some(c.id)),
                        _ => (DuplicateType::Internal, None),
                    };
                    for a in &members {
                        summary.duplicate_rows.push(DuplicateRowEntry {
                            row_number: a.row_number(),
                            group_id: group.group_id.clone(),
                            duplicate_type,
                            existing_contact_id: existing_id,
                            record: a.record.clone(),
                            warnings: a.warnings(),
                        });
                    }
                }
                ExistingRecordMatch::Multiple(contacts) => {
                    let reason = format!(
                        "匹配到 {} 个已有联系人: {}",
                        contacts.len(),
                        candidate_ids
                            .iter()
                            .map(|id| format!("#{}", id))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    for a in &members {
                        summary.conflict_rows.push(ConflictRowEntry {
                            row_number: a.row_number(),
                            group_id: Some(group.group_id.clone()),
                            candidate_contact_ids: candidate_ids.clone(),
                            reason: reason.clone(),
                            record: Some(a.record.clone()),
                        });
                    }
                }
            }

            let preview = match &existing {
                ExistingRecordMatch::Single(contact) => preview_merge(&merged.record, contact),
                _ => Vec::new(),
            };

            cache_entries.push(DuplicateCacheEntry {
                validation_id: validation_id.to_string(),
                duplicate_group_id: group.group_id.clone(),
                classification: kind,
                existing_contact_id: match &existing {
                    ExistingRecordMatch::Single(c) => Some(c.id),
                    _ => None,
                },
                candidate_contact_ids: candidate_ids.clone(),
                completeness_score: merged.completeness,
                recommendation: recommendation_for(kind).to_string(),
                row_numbers: group.row_numbers.clone(),
            });

            summary.groups.push(GroupReport {
                group_id: group.group_id.clone(),
                row_numbers: group.row_numbers.clone(),
                classification: kind,
                candidate_contact_ids: candidate_ids,
                merged,
                recommendation: recommendation_for(kind).to_string(),
                preview,
            });
        }

        // ===== 3. 无标识的有效行 =====
        let mut standalone_rows = Vec::new();
        for a in assessments {
            if a.is_eligible() && !grouped_rows.contains(&a.row_number()) {
                standalone_rows.push(a.row_number());
                summary.new_rows.push(NewRowEntry {
                    row_number: a.row_number(),
                    group_id: None,
                    record: a.record.clone(),
                    warnings: a.warnings(),
                });
            }
        }

        summary.new_rows.sort_by_key(|r| r.row_number);
        summary.duplicate_rows.sort_by_key(|r| r.row_number);
        summary.conflict_rows.sort_by_key(|r| r.row_number);
        summary.invalid_rows.sort_by_key(|r| r.row_number);

        BuiltSummary {
            summary,
            standalone_rows,
            cache_entries,
        }
    }
}
