// ==========================================
// 联系人导入去重系统 - 联系人领域模型
// ==========================================
// 依据: contacts 表
// 红线: 固定字段 + 溢出桶,不使用开放 Map 承载已知字段
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// ContactField - 已知联系人字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    FirstName,
    LastName,
    Email,
    Phone,
    Company,
    JobTitle,
    Address,
    City,
    State,
    PostalCode,
    Country,
    Birthday,
    Notes,
}

impl ContactField {
    /// 全部已知字段（固定顺序，合并/预览按此顺序输出）
    pub const ALL: [ContactField; 13] = [
        ContactField::FirstName,
        ContactField::LastName,
        ContactField::Email,
        ContactField::Phone,
        ContactField::Company,
        ContactField::JobTitle,
        ContactField::Address,
        ContactField::City,
        ContactField::State,
        ContactField::PostalCode,
        ContactField::Country,
        ContactField::Birthday,
        ContactField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactField::FirstName => "first_name",
            ContactField::LastName => "last_name",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::Company => "company",
            ContactField::JobTitle => "job_title",
            ContactField::Address => "address",
            ContactField::City => "city",
            ContactField::State => "state",
            ContactField::PostalCode => "postal_code",
            ContactField::Country => "country",
            ContactField::Birthday => "birthday",
            ContactField::Notes => "notes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ContactField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s.trim())
    }

    /// 是否为身份标识字段（参与去重）
    pub fn is_identifier(&self) -> bool {
        matches!(self, ContactField::Email | ContactField::Phone)
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 空白字符串视为缺失
fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

// ==========================================
// ContactRecord - 字段映射后的导入行
// ==========================================
// 用途: 映射层输出,合并算法输入/输出
// 说明: row_number 为原始文件数据行号（从 1 开始）；库中记录转换而来时为 0
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub row_number: usize,

    // ===== 姓名 =====
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    // ===== 身份标识（原始值，可能含多个，以 , 或 ; 分隔）=====
    pub email: Option<String>,
    pub phone: Option<String>,

    // ===== 业务字段 =====
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,

    // ===== 溢出桶（未知目标字段 / 未映射列）=====
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ContactRecord {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            ..Default::default()
        }
    }

    pub fn get(&self, field: ContactField) -> Option<&str> {
        let slot = match field {
            ContactField::FirstName => &self.first_name,
            ContactField::LastName => &self.last_name,
            ContactField::Email => &self.email,
            ContactField::Phone => &self.phone,
            ContactField::Company => &self.company,
            ContactField::JobTitle => &self.job_title,
            ContactField::Address => &self.address,
            ContactField::City => &self.city,
            ContactField::State => &self.state,
            ContactField::PostalCode => &self.postal_code,
            ContactField::Country => &self.country,
            ContactField::Birthday => &self.birthday,
            ContactField::Notes => &self.notes,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, field: ContactField) -> &mut Option<String> {
        match field {
            ContactField::FirstName => &mut self.first_name,
            ContactField::LastName => &mut self.last_name,
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
            ContactField::Company => &mut self.company,
            ContactField::JobTitle => &mut self.job_title,
            ContactField::Address => &mut self.address,
            ContactField::City => &mut self.city,
            ContactField::State => &mut self.state,
            ContactField::PostalCode => &mut self.postal_code,
            ContactField::Country => &mut self.country,
            ContactField::Birthday => &mut self.birthday,
            ContactField::Notes => &mut self.notes,
        }
    }

    /// 设置已知字段（空白值写为 None）
    pub fn set(&mut self, field: ContactField, value: Option<String>) {
        *self.slot_mut(field) = non_empty(value);
    }

    /// 按字段名读取（已知字段优先，其余查溢出桶）
    pub fn value(&self, name: &str) -> Option<&str> {
        match ContactField::parse(name) {
            Some(field) => self.get(field),
            None => self.extra.get(name).map(|v| v.as_str()),
        }
    }

    /// 按字段名写入（已知字段优先，其余写溢出桶）
    pub fn set_value(&mut self, name: &str, value: Option<String>) {
        match ContactField::parse(name) {
            Some(field) => self.set(field, value),
            None => match non_empty(value) {
                Some(v) => {
                    self.extra.insert(name.to_string(), v);
                }
                None => {
                    self.extra.remove(name);
                }
            },
        }
    }

    /// 全部字段名：固定字段 + 溢出桶键
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ContactField::ALL
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        names.extend(self.extra.keys().cloned());
        names
    }

    /// 显示名称（用于冲突提示）
    pub fn display_name(&self) -> String {
        display_name_of(
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.email.as_deref(),
        )
    }
}

fn display_name_of(first: Option<&str>, last: Option<&str>, email: Option<&str>) -> String {
    let name = [first, last]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        name
    } else {
        email.unwrap_or("(unnamed)").to_string()
    }
}

// ==========================================
// Contact - 持久化联系人（外部协作实体）
// ==========================================
// 引擎只关心: id / is_active / is_deleted / email / normalized_phone + 业务字段
// 对齐: contacts 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,

    // ===== 身份标识（规范化值）=====
    pub email: Option<String>,            // 主邮箱（小写）
    pub normalized_phone: Option<String>, // 主电话（+1XXXXXXXXXX）
    pub phone: Option<String>,            // 展示用原始电话

    // ===== 业务字段 =====
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,

    // ===== 状态 =====
    pub is_active: bool,
    pub is_deleted: bool,

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Contact {
    /// 是否参与去重（仅活跃且未软删除）
    pub fn is_live(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    pub fn display_name(&self) -> String {
        display_name_of(
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.email.as_deref(),
        )
    }

    /// 转换为 ContactRecord（用于与导入行合并/预览）
    pub fn to_record(&self) -> ContactRecord {
        ContactRecord {
            row_number: 0,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone().or_else(|| self.normalized_phone.clone()),
            company: self.company.clone(),
            job_title: self.job_title.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            birthday: self.birthday.clone(),
            notes: self.notes.clone(),
            extra: self.extra.clone(),
        }
    }
}

// ==========================================
// ContactDraft - 写入载荷
// ==========================================
// 说明: email / normalized_phone 为已规范化的主标识，由引擎层计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub record: ContactRecord,
    pub email: Option<String>,
    pub normalized_phone: Option<String>,
}
