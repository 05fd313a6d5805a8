// ==========================================
// 联系人导入去重系统 - 标识冲突检测
// ==========================================
// 职责: 写入前检查主邮箱/主电话是否已被其他活跃联系人占用
// 说明: 这是快速预检；最终裁决由 contacts 表部分唯一索引完成
// ==========================================

use crate::domain::contact::{ContactDraft, ContactField};
use crate::domain::dedup::IdentifierConflict;
use crate::domain::validation::PRIMARY_IDENTIFIER_FIELDS;
use crate::repository::contact_store::ContactStore;
use crate::repository::error::RepositoryResult;
use std::sync::Arc;

pub struct ConflictDetector {
    store: Arc<dyn ContactStore>,
}

impl ConflictDetector {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    /// 检测待写入数据的标识冲突
    ///
    /// # 参数
    /// - target_contact_id: 更新目标（新建时为 None），检查时排除自身
    /// - draft: 待写入数据
    ///
    /// # 返回
    /// - 冲突列表（空表示可写入）
    pub async fn detect_identifier_conflicts(
        &self,
        target_contact_id: Option<i64>,
        draft: &ContactDraft,
    ) -> RepositoryResult<Vec<IdentifierConflict>> {
        let mut conflicts = Vec::new();

        for field in PRIMARY_IDENTIFIER_FIELDS {
            let (value, holder) = match field {
                ContactField::Email => match &draft.email {
                    Some(email) => (
                        email,
                        self.store.find_active_by_email(email, target_contact_id).await?,
                    ),
                    None => continue,
                },
                ContactField::Phone => match &draft.normalized_phone {
                    Some(phone) => (
                        phone,
                        self.store.find_active_by_phone(phone, target_contact_id).await?,
                    ),
                    None => continue,
                },
                _ => continue,
            };

            if let Some(contact) = holder {
                conflicts.push(IdentifierConflict {
                    field,
                    value: value.clone(),
                    contact_id: contact.id,
                    contact_name: contact.display_name(),
                });
            }
        }

        Ok(conflicts)
    }
}

/// 冲突列表的可读描述
pub fn describe_conflicts(conflicts: &[IdentifierConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            format!(
                "{} {} 已被联系人 #{} ({}) 占用",
                c.field, c.value, c.contact_id, c.contact_name
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
