// ==========================================
// 联系人导入去重系统 - 字段映射器
// ==========================================
// 职责: 源列 → 标准字段映射（显式映射或按列名别名自动识别）
// 红线: 两列给同一标识字段提供不同规范值时，该行判为冲突，不得择一
// ==========================================

use crate::domain::contact::{ContactField, ContactRecord};
use crate::domain::dedup::RawRow;
use crate::domain::types::DqLevel;
use crate::domain::validation::DqViolation;
use crate::engine::normalizer::{explode_emails, explode_phones};
use crate::importer::error::{ImportError, ImportResult};
use std::collections::{BTreeMap, BTreeSet};

/// 映射目标: 忽略该列
pub const SKIP_TARGET: &str = "skip";
/// 映射目标: 全名（拆分为 first_name / last_name）
pub const FULL_NAME_TARGET: &str = "full_name";

#[derive(Debug, Clone, PartialEq, Eq)]
enum MappingTarget {
    Field(ContactField),
    FullName,
    Extra(String),
    Skip,
}

impl MappingTarget {
    fn parse(target: &str) -> Self {
        let t = target.trim();
        if t.eq_ignore_ascii_case(SKIP_TARGET) {
            MappingTarget::Skip
        } else if t == FULL_NAME_TARGET {
            MappingTarget::FullName
        } else {
            match ContactField::parse(t) {
                Some(field) => MappingTarget::Field(field),
                None => MappingTarget::Extra(t.to_string()),
            }
        }
    }

    fn as_target(&self) -> String {
        match self {
            MappingTarget::Field(f) => f.as_str().to_string(),
            MappingTarget::FullName => FULL_NAME_TARGET.to_string(),
            MappingTarget::Extra(name) => name.clone(),
            MappingTarget::Skip => SKIP_TARGET.to_string(),
        }
    }
}

/// 列名归一: 小写，去掉空白、下划线、连字符、点
fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '_' | '-' | '.'))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 列名别名表（归一后的列名）
fn alias_target(key: &str) -> Option<MappingTarget> {
    let field = match key {
        "firstname" | "first" | "givenname" | "fname" | "名" => ContactField::FirstName,
        "lastname" | "last" | "surname" | "familyname" | "lname" | "姓" => ContactField::LastName,
        "email" | "emailaddress" | "mail" | "emails" | "邮箱" | "电子邮件" => ContactField::Email,
        "phone" | "phonenumber" | "mobile" | "mobilephone" | "cell" | "telephone" | "tel"
        | "phones" | "电话" | "手机" => ContactField::Phone,
        "company" | "organization" | "organisation" | "employer" | "公司" => ContactField::Company,
        "jobtitle" | "title" | "position" | "职位" => ContactField::JobTitle,
        "address" | "street" | "streetaddress" | "地址" => ContactField::Address,
        "city" | "town" | "城市" => ContactField::City,
        "state" | "province" | "region" | "省份" => ContactField::State,
        "postalcode" | "zip" | "zipcode" | "postcode" | "邮编" => ContactField::PostalCode,
        "country" | "国家" => ContactField::Country,
        "birthday" | "birthdate" | "dateofbirth" | "dob" | "生日" => ContactField::Birthday,
        "notes" | "note" | "comments" | "comment" | "备注" => ContactField::Notes,
        "name" | "fullname" | "contactname" | "姓名" => return Some(MappingTarget::FullName),
        _ => return None,
    };
    Some(MappingTarget::Field(field))
}

/// 映射后的行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRow {
    pub record: ContactRecord,
    /// 标识字段映射冲突（DqLevel::Conflict）
    pub conflicts: Vec<DqViolation>,
}

// ==========================================
// FieldMapping - 列映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMapping {
    columns: BTreeMap<String, MappingTarget>,
}

impl FieldMapping {
    /// 由显式映射构建（源列 → 目标字段名）
    ///
    /// 目标为 "skip" 的列被忽略；未知目标作为扩展字段保存。
    pub fn from_map(map: &BTreeMap<String, String>) -> ImportResult<Self> {
        let mut columns = BTreeMap::new();
        for (source, target) in map {
            if target.trim().is_empty() {
                return Err(ImportError::InvalidMapping(format!("列 {} 的映射目标为空", source)));
            }
            columns.insert(source.trim().to_string(), MappingTarget::parse(target));
        }
        Ok(Self { columns })
    }

    /// 按列名别名自动识别；无法识别的列作为扩展字段保存
    pub fn auto_detect(headers: &[String]) -> Self {
        let columns = headers
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| {
                let target = alias_target(&header_key(h))
                    .unwrap_or_else(|| MappingTarget::Extra(h.trim().to_string()));
                (h.trim().to_string(), target)
            })
            .collect();
        Self { columns }
    }

    /// 显式映射优先，缺失的列按别名补齐
    pub fn resolve(headers: &[String], explicit: Option<&BTreeMap<String, String>>) -> ImportResult<Self> {
        let mut mapping = Self::auto_detect(headers);
        if let Some(map) = explicit {
            let overrides = Self::from_map(map)?;
            mapping.columns.extend(overrides.columns);
        }
        Ok(mapping)
    }

    /// 导出为 源列 → 目标字段名（用于持久化）
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.columns
            .iter()
            .map(|(k, v)| (k.clone(), v.as_target()))
            .collect()
    }

    fn target_of(&self, column: &str) -> MappingTarget {
        self.columns
            .get(column.trim())
            .cloned()
            .unwrap_or_else(|| MappingTarget::Extra(column.trim().to_string()))
    }

    /// 映射一行
    ///
    /// - 非标识字段: 多列映射到同一字段时取第一个非空值
    /// - 标识字段: 多列的规范值集合不一致时记为冲突，保留第一列的值
    pub fn map_row(&self, row: &RawRow) -> MappedRow {
        let mut record = ContactRecord::new(row.row_number);
        let mut conflicts = Vec::new();

        for (column, value) in &row.cells {
            let value = match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => v,
                _ => continue,
            };

            match self.target_of(column) {
                MappingTarget::Skip => {}
                MappingTarget::Extra(name) if name.is_empty() => {}
                MappingTarget::Extra(name) => {
                    if record.value(&name).is_none() {
                        record.set_value(&name, Some(value.to_string()));
                    }
                }
                MappingTarget::FullName => {
                    let (first, last) = split_full_name(value);
                    if record.first_name.is_none() {
                        record.set(ContactField::FirstName, first);
                    }
                    if record.last_name.is_none() {
                        record.set(ContactField::LastName, last);
                    }
                }
                MappingTarget::Field(field) => match record.get(field) {
                    None => record.set(field, Some(value.to_string())),
                    Some(existing) if field.is_identifier() => {
                        if let Some(message) = identifier_collision(field, existing, value) {
                            conflicts.push(DqViolation {
                                row_number: row.row_number,
                                level: DqLevel::Conflict,
                                field: field.as_str().to_string(),
                                message: format!("列 {}: {}", column, message),
                            });
                        }
                    }
                    Some(_) => {}
                },
            }
        }

        MappedRow { record, conflicts }
    }
}

/// 同一标识字段的两个来源值是否冲突（都能规范化且规范值集合不同）
fn identifier_collision(field: ContactField, first: &str, second: &str) -> Option<String> {
    let canon = |raw: &str| -> BTreeSet<String> {
        match field {
            ContactField::Email => explode_emails(raw).into_iter().collect(),
            _ => explode_phones(raw).into_iter().collect(),
        }
    };
    let (a, b) = (canon(first), canon(second));
    if a.is_empty() || b.is_empty() || a == b {
        return None;
    }
    Some(format!("{} 取值不一致 ({} / {})", field, first, second))
}

/// 全名拆分: 最后一个词为 last_name，其余为 first_name
fn split_full_name(full: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = full.split_whitespace().collect();
    match parts.as_slice() {
        [] => (None, None),
        [only] => (Some(only.to_string()), None),
        [rest @ .., last] => (Some(rest.join(" ")), Some(last.to_string())),
    }
}
