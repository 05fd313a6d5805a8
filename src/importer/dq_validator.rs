// ==========================================
// 联系人导入去重系统 - 数据质量校验器
// ==========================================
// 职责: 行级 DQ 校验（Error 阻断 / Warning 提示）
// 说明: Conflict 级别来自字段映射，不在这里产生
// ==========================================

use crate::domain::contact::{ContactField, ContactRecord};
use crate::domain::types::DqLevel;
use crate::domain::validation::DqViolation;
use crate::engine::normalizer::explode_phones;
use chrono::NaiveDate;

/// 可接受的生日格式
const BIRTHDAY_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// 至少需要一个的可识别字段
const IDENTIFYING_FIELDS: [ContactField; 5] = [
    ContactField::Email,
    ContactField::Phone,
    ContactField::FirstName,
    ContactField::LastName,
    ContactField::Company,
];

pub struct DqValidator {
    required_fields: Vec<ContactField>,
}

impl DqValidator {
    pub fn new(required_fields: Vec<ContactField>) -> Self {
        Self { required_fields }
    }

    /// 单行校验
    pub fn validate_row(&self, record: &ContactRecord) -> Vec<DqViolation> {
        let mut violations = Vec::new();
        let row_number = record.row_number;
        let mut push = |level: DqLevel, field: &str, message: String| {
            violations.push(DqViolation {
                row_number,
                level,
                field: field.to_string(),
                message,
            });
        };

        // DQ Error: 必填字段
        for field in &self.required_fields {
            if record.get(*field).is_none() {
                push(DqLevel::Error, field.as_str(), format!("必填字段 {} 为空", field));
            }
        }

        // DQ Error: 无任何可识别字段
        if IDENTIFYING_FIELDS.iter().all(|f| record.get(*f).is_none()) {
            push(
                DqLevel::Error,
                "email,phone,first_name,last_name,company",
                "缺少可识别字段（邮箱/电话/姓名/公司至少一项）".to_string(),
            );
        }

        // DQ Error: 邮箱格式（每个分隔的值都必须含 @）
        if let Some(raw) = record.get(ContactField::Email) {
            for token in raw.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
                if !token.contains('@') {
                    push(DqLevel::Error, "email", format!("邮箱格式错误: {}", token));
                }
            }
        }

        // DQ Error: 生日格式
        if let Some(raw) = record.get(ContactField::Birthday) {
            if parse_birthday(raw).is_none() {
                push(DqLevel::Error, "birthday", format!("生日无法解析: {}", raw));
            }
        }

        // DQ Warning: 电话无法规范化
        if let Some(raw) = record.get(ContactField::Phone) {
            if explode_phones(raw).is_empty() {
                push(
                    DqLevel::Warning,
                    "phone",
                    format!("电话无法规范化，不参与匹配: {}", raw),
                );
            }
        }

        violations
    }

    /// 是否存在阻断级违规
    pub fn has_errors(violations: &[DqViolation]) -> bool {
        violations.iter().any(|v| v.level == DqLevel::Error)
    }
}

/// 按支持的格式解析生日
pub fn parse_birthday(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    BIRTHDAY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}
