// ==========================================
// 联系人导入去重系统 - 标识规范化
// ==========================================
// 职责: 邮箱/电话规范化（纯函数，任何输入都不报错）
// 红线: 无法确定的电话一律返回 None，不做猜测补全
// ==========================================

use crate::domain::contact::{ContactDraft, ContactField, ContactRecord};
use crate::domain::dedup::NormalizedIdentifiers;

/// 多值单元格分隔符
const MULTI_VALUE_SEPARATORS: [char; 2] = [',', ';'];

/// 邮箱规范化: 去首尾空白 + 小写
///
/// 不校验格式；格式问题由 DQ 校验负责。
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// 电话规范化为 +1XXXXXXXXXX
///
/// 规则:
/// - 只保留数字（前导 + 一并去掉）
/// - 11 位且以 1 开头 → +<11位>
/// - 10 位 → +1<10位>
/// - 其他位数 → None
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        11 if digits.starts_with('1') => Some(format!("+{}", digits)),
        10 => Some(format!("+1{}", digits)),
        _ => None,
    }
}

/// 拆分多值邮箱单元格（保持顺序，不去重）
pub fn explode_emails(raw: &str) -> Vec<String> {
    raw.split(&MULTI_VALUE_SEPARATORS[..])
        .filter_map(normalize_email)
        .collect()
}

/// 拆分多值电话单元格（保持顺序，不去重）
pub fn explode_phones(raw: &str) -> Vec<String> {
    raw.split(&MULTI_VALUE_SEPARATORS[..])
        .filter_map(normalize_phone)
        .collect()
}

/// 计算一行的规范化标识集合
pub fn identifiers_of(record: &ContactRecord) -> NormalizedIdentifiers {
    let mut ids = NormalizedIdentifiers::default();
    if let Some(raw) = record.get(ContactField::Email) {
        ids.emails.extend(explode_emails(raw));
    }
    if let Some(raw) = record.get(ContactField::Phone) {
        ids.phones.extend(explode_phones(raw));
    }
    ids
}

/// 主邮箱: 单元格中第一个有效邮箱
pub fn primary_email(record: &ContactRecord) -> Option<String> {
    record
        .get(ContactField::Email)
        .and_then(|raw| explode_emails(raw).into_iter().next())
}

/// 主电话: 单元格中第一个可规范化的电话
pub fn primary_phone(record: &ContactRecord) -> Option<String> {
    record
        .get(ContactField::Phone)
        .and_then(|raw| explode_phones(raw).into_iter().next())
}

/// 由合并结果生成待写入草稿（库中 email / normalized_phone 存主标识）
pub fn draft_from_record(record: &ContactRecord) -> ContactDraft {
    ContactDraft {
        email: primary_email(record),
        normalized_phone: primary_phone(record),
        record: record.clone(),
    }
}
