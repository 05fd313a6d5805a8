// ==========================================
// 联系人导入去重系统 - 完整度评分与行合并
// ==========================================
// 职责: 完整度评分 / 批内合并 / 与库中记录合并 / 合并预览
// 红线: 合并只补不删，不编造任何值
// ==========================================

use crate::domain::contact::{Contact, ContactField, ContactRecord};
use crate::domain::dedup::{FieldPreview, FieldSource, MergedRow};
use crate::domain::types::MergeStrategy;
use std::collections::{BTreeMap, BTreeSet};

/// 完整度评分: 非空字段个数（含扩展字段），各字段等权
pub fn completeness_score(record: &ContactRecord) -> usize {
    let fixed = ContactField::ALL
        .iter()
        .filter(|f| record.get(**f).map(|v| !v.trim().is_empty()).unwrap_or(false))
        .count();
    let extra = record.extra.values().filter(|v| !v.trim().is_empty()).count();
    fixed + extra
}

/// 两侧出现过的全部字段名（固定字段在前，扩展字段按字典序）
fn union_field_names(a: &ContactRecord, b: &ContactRecord) -> Vec<String> {
    let mut names: Vec<String> = ContactField::ALL
        .iter()
        .map(|f| f.as_str().to_string())
        .collect();
    let extra: BTreeSet<&String> = a.extra.keys().chain(b.extra.keys()).collect();
    names.extend(extra.into_iter().cloned());
    names
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// 批内重复行合并
///
/// 1. 选完整度最高的行为基准（并列取最先出现）
/// 2. 基准中为空的字段，按原始顺序取其他行第一个非空值
///
/// 空输入返回 None。
pub fn merge_internal_duplicates(rows: &[ContactRecord]) -> Option<MergedRow> {
    let first = rows.first()?;

    let mut base_idx = 0;
    let mut best = completeness_score(first);
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let score = completeness_score(row);
        if score > best {
            best = score;
            base_idx = idx;
        }
    }

    let base = &rows[base_idx];
    let mut record = base.clone();
    let mut provenance = BTreeMap::new();

    let mut names: Vec<String> = ContactField::ALL
        .iter()
        .map(|f| f.as_str().to_string())
        .collect();
    let extra: BTreeSet<&String> = rows.iter().flat_map(|r| r.extra.keys()).collect();
    names.extend(extra.into_iter().cloned());

    for name in &names {
        if present(base.value(name)).is_some() {
            provenance.insert(name.clone(), FieldSource::Row(base.row_number));
            continue;
        }
        if let Some((donor, value)) = rows
            .iter()
            .find_map(|r| present(r.value(name)).map(|v| (r.row_number, v.to_string())))
        {
            record.set_value(name, Some(value));
            provenance.insert(name.clone(), FieldSource::Row(donor));
        }
    }

    Some(MergedRow {
        completeness: completeness_score(&record),
        record,
        provenance,
        source_rows: rows.iter().map(|r| r.row_number).collect(),
    })
}

/// 导入行与库中记录合并
///
/// - CsvPriority: 导入行非空字段覆盖库中值
/// - FillEmpty: 导入行只填补库中空字段
///
/// 两种策略都保留导入行未涉及的库中字段。
pub fn merge_external_duplicate(
    incoming: &ContactRecord,
    existing: &Contact,
    strategy: MergeStrategy,
) -> MergedRow {
    let incoming_row = MergedRow {
        completeness: completeness_score(incoming),
        record: incoming.clone(),
        provenance: BTreeMap::new(),
        source_rows: vec![incoming.row_number],
    };
    merge_group_with_existing(&incoming_row, existing, strategy)
}

/// 批内合并结果与库中记录合并（保留批内来源行号）
pub fn merge_group_with_existing(
    incoming: &MergedRow,
    existing: &Contact,
    strategy: MergeStrategy,
) -> MergedRow {
    let existing_record = existing.to_record();
    let mut record = existing_record.clone();
    record.row_number = incoming.record.row_number;
    let mut provenance = BTreeMap::new();

    for name in union_field_names(&incoming.record, &existing_record) {
        let csv_value = present(incoming.record.value(&name));
        let db_value = present(existing_record.value(&name));

        let take_incoming = match strategy {
            MergeStrategy::CsvPriority => csv_value.is_some(),
            MergeStrategy::FillEmpty => db_value.is_none() && csv_value.is_some(),
        };

        if take_incoming {
            record.set_value(&name, csv_value.map(|v| v.to_string()));
            let source = incoming
                .provenance
                .get(&name)
                .copied()
                .unwrap_or(FieldSource::Row(incoming.record.row_number));
            provenance.insert(name, source);
        } else if db_value.is_some() {
            provenance.insert(name, FieldSource::Existing(existing.id));
        }
    }

    MergedRow {
        completeness: completeness_score(&record),
        record,
        provenance,
        source_rows: incoming.source_rows.clone(),
    }
}

/// 应用人工覆盖（覆盖值优先级最高；None 表示清空该字段）
pub fn apply_overrides(merged: &mut MergedRow, overrides: &BTreeMap<String, Option<String>>) {
    if overrides.is_empty() {
        return;
    }
    for (name, value) in overrides {
        merged.record.set_value(name, value.clone());
        if present(merged.record.value(name)).is_some() {
            merged.provenance.insert(name.clone(), FieldSource::Override);
        } else {
            merged.provenance.remove(name);
        }
    }
    merged.completeness = completeness_score(&merged.record);
}

/// 合并预览: 逐字段对比导入值、库中值与 csv_priority 合并结果
///
/// 只列出至少一侧非空的字段。`changed` 按原样文本比较（仅去首尾空白），
/// 因此邮箱大小写或电话格式不同也会标记为变更，与 `merged_value` 保持一致。
pub fn preview_merge(incoming: &ContactRecord, existing: &Contact) -> Vec<FieldPreview> {
    let existing_record = existing.to_record();
    let merged = merge_external_duplicate(incoming, existing, MergeStrategy::CsvPriority);

    union_field_names(incoming, &existing_record)
        .into_iter()
        .filter_map(|name| {
            let csv_value = present(incoming.value(&name)).map(|v| v.to_string());
            let db_value = present(existing_record.value(&name)).map(|v| v.to_string());
            if csv_value.is_none() && db_value.is_none() {
                return None;
            }
            let changed = match (&csv_value, &db_value) {
                (Some(csv), Some(db)) => csv.trim() != db.trim(),
                (Some(_), None) => true,
                (None, _) => false,
            };
            Some(FieldPreview {
                merged_value: merged.record.value(&name).map(|v| v.to_string()),
                field: name,
                csv_value,
                db_value,
                changed,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::normalizer::normalize_phone;
    use chrono::NaiveDate;

    fn record(n: usize, pairs: &[(&str, &str)]) -> ContactRecord {
        let mut r = ContactRecord::new(n);
        for (k, v) in pairs {
            r.set_value(k, Some(v.to_string()));
        }
        r
    }

    fn existing(id: i64, pairs: &[(&str, &str)]) -> Contact {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let r = record(0, pairs);
        Contact {
            id,
            email: r.email.clone(),
            normalized_phone: r.phone.as_deref().and_then(normalize_phone),
            phone: r.phone.clone(),
            first_name: r.first_name.clone(),
            last_name: r.last_name.clone(),
            company: r.company.clone(),
            job_title: r.job_title.clone(),
            address: r.address.clone(),
            city: r.city.clone(),
            state: r.state.clone(),
            postal_code: r.postal_code.clone(),
            country: r.country.clone(),
            birthday: r.birthday.clone(),
            notes: r.notes.clone(),
            extra: r.extra.clone(),
            is_active: true,
            is_deleted: false,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_completeness_counts_non_blank_fields() {
        let r = record(1, &[("email", "a@x.com"), ("city", "Austin"), ("linkedin", "in/a")]);
        assert_eq!(completeness_score(&r), 3);
        assert_eq!(completeness_score(&ContactRecord::new(1)), 0);
    }

    #[test]
    fn test_internal_merge_picks_most_complete_base() {
        let a = record(1, &[("email", "JOHN@X.com")]);
        let b = record(2, &[("email", "john@x.com"), ("first_name", "John"), ("last_name", "Doe")]);

        let merged = merge_internal_duplicates(&[a, b]).unwrap();
        assert_eq!(merged.record.email.as_deref(), Some("john@x.com"));
        assert_eq!(merged.record.first_name.as_deref(), Some("John"));
        assert_eq!(merged.record.last_name.as_deref(), Some("Doe"));
        assert_eq!(merged.provenance.get("email"), Some(&FieldSource::Row(2)));
        assert_eq!(merged.source_rows, vec![1, 2]);
    }

    #[test]
    fn test_internal_merge_fills_gaps_in_original_order() {
        let a = record(1, &[("email", "a@x.com"), ("first_name", "Ann"), ("city", "Austin")]);
        let b = record(2, &[("phone", "555-123-4567"), ("company", "Acme")]);
        let c = record(3, &[("phone", "555-999-0000"), ("notes", "vip")]);

        let merged = merge_internal_duplicates(&[a.clone(), b, c]).unwrap();
        assert_eq!(merged.record.phone.as_deref(), Some("555-123-4567"));
        assert_eq!(merged.record.company.as_deref(), Some("Acme"));
        assert_eq!(merged.record.notes.as_deref(), Some("vip"));
        assert_eq!(merged.provenance.get("notes"), Some(&FieldSource::Row(3)));
        assert!(merged.completeness >= completeness_score(&a));
    }

    #[test]
    fn test_internal_merge_single_row_unchanged() {
        let a = record(4, &[("email", "a@x.com"), ("tag", "x")]);
        let merged = merge_internal_duplicates(std::slice::from_ref(&a)).unwrap();
        assert_eq!(merged.record, a);
        assert!(merge_internal_duplicates(&[]).is_none());
    }

    #[test]
    fn test_internal_merge_never_discards_or_fabricates() {
        let rows = vec![
            record(1, &[("email", "a@x.com"), ("city", "Austin")]),
            record(2, &[("email", "a@x.com"), ("company", "Acme"), ("state", "TX")]),
            record(3, &[("email", "a@x.com"), ("source", "fair")]),
        ];
        let merged = merge_internal_duplicates(&rows).unwrap();

        for name in merged.record.field_names() {
            if let Some(v) = merged.record.value(&name) {
                assert!(rows.iter().any(|r| r.value(&name) == Some(v)), "fabricated {}", name);
            }
        }
        for r in &rows {
            assert!(merged.completeness >= completeness_score(r));
        }
    }

    #[test]
    fn test_csv_priority_overwrites_and_preserves() {
        let incoming = record(1, &[("email", "a@x.com")]);
        let db = existing(7, &[("email", "old@x.com"), ("phone", "+15551234567")]);

        let merged = merge_external_duplicate(&incoming, &db, MergeStrategy::CsvPriority);
        assert_eq!(merged.record.email.as_deref(), Some("a@x.com"));
        assert_eq!(merged.record.phone.as_deref(), Some("+15551234567"));
        assert_eq!(merged.provenance.get("email"), Some(&FieldSource::Row(1)));
        assert_eq!(merged.provenance.get("phone"), Some(&FieldSource::Existing(7)));
    }

    #[test]
    fn test_fill_empty_only_backfills() {
        let incoming = record(1, &[("email", "a@x.com"), ("company", "NewCo"), ("city", "Reno")]);
        let db = existing(7, &[("email", "old@x.com"), ("company", "OldCo")]);

        let merged = merge_external_duplicate(&incoming, &db, MergeStrategy::FillEmpty);
        assert_eq!(merged.record.email.as_deref(), Some("old@x.com"));
        assert_eq!(merged.record.company.as_deref(), Some("OldCo"));
        assert_eq!(merged.record.city.as_deref(), Some("Reno"));
    }

    #[test]
    fn test_external_merge_keeps_existing_extra_fields() {
        let incoming = record(1, &[("email", "a@x.com"), ("source", "csv")]);
        let db = existing(3, &[("email", "a@x.com"), ("crm_id", "C-9")]);

        for strategy in [MergeStrategy::CsvPriority, MergeStrategy::FillEmpty] {
            let merged = merge_external_duplicate(&incoming, &db, strategy);
            assert_eq!(merged.record.value("crm_id"), Some("C-9"));
            assert_eq!(merged.record.value("source"), Some("csv"));
        }
    }

    #[test]
    fn test_overrides_win_and_can_clear() {
        let incoming = record(1, &[("email", "a@x.com"), ("company", "NewCo")]);
        let db = existing(3, &[("email", "a@x.com"), ("city", "Austin")]);
        let mut merged = merge_external_duplicate(&incoming, &db, MergeStrategy::CsvPriority);

        let mut overrides = BTreeMap::new();
        overrides.insert("company".to_string(), Some("Hand Picked".to_string()));
        overrides.insert("city".to_string(), None);
        apply_overrides(&mut merged, &overrides);

        assert_eq!(merged.record.company.as_deref(), Some("Hand Picked"));
        assert_eq!(merged.record.city, None);
        assert_eq!(merged.provenance.get("company"), Some(&FieldSource::Override));
        assert!(!merged.provenance.contains_key("city"));
    }

    #[test]
    fn test_preview_merge_flags_changes() {
        let incoming = record(1, &[("email", "A@X.com"), ("company", "NewCo"), ("phone", "(555) 123-4567")]);
        let db = existing(3, &[("email", "a@x.com"), ("company", "OldCo"), ("phone", "555-123-4567"), ("city", "Austin")]);

        let preview = preview_merge(&incoming, &db);
        let by_field: BTreeMap<_, _> = preview.iter().map(|p| (p.field.as_str(), p)).collect();

        assert_eq!(by_field.len(), 4);
        // 仅格式不同: 合并结果采用导入值，因此也是变更
        assert!(by_field["email"].changed);
        assert!(by_field["phone"].changed);
        assert_eq!(by_field["phone"].merged_value.as_deref(), Some("(555) 123-4567"));
        assert!(by_field["company"].changed);
        assert_eq!(by_field["company"].merged_value.as_deref(), Some("NewCo"));
        assert!(!by_field["city"].changed);
        assert_eq!(by_field["city"].merged_value.as_deref(), Some("Austin"));
    }

    #[test]
    fn test_preview_merge_identical_values_are_unchanged() {
        let incoming = record(1, &[("email", "a@x.com"), ("phone", " 555-123-4567 ")]);
        let db = existing(3, &[("email", "a@x.com"), ("phone", "555-123-4567")]);

        let preview = preview_merge(&incoming, &db);

        for p in &preview {
            assert!(!p.changed, "{} should be unchanged", p.field);
            assert_eq!(p.merged_value.as_deref().map(str::trim), p.db_value.as_deref());
        }
    }
}
