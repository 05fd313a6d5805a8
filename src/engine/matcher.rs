// ==========================================
// 联系人导入去重系统 - 外部匹配
// ==========================================
// 职责: 按规范化标识查询库中活跃联系人，并归类为 none / single / multiple
// 约束: 标识按块大小分批 IN 查询，整批只查一次库
// ==========================================

use crate::domain::contact::Contact;
use crate::domain::dedup::{DuplicateGroup, ExistingRecordMatch, NormalizedIdentifiers};
use crate::repository::contact_store::ContactStore;
use crate::repository::error::RepositoryResult;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 默认单次 IN 查询的标识数量
pub const DEFAULT_IDENTIFIER_CHUNK_SIZE: usize = 500;

// ==========================================
// ExternalMatcher
// ==========================================
pub struct ExternalMatcher {
    store: Arc<dyn ContactStore>,
    chunk_size: usize,
}

impl ExternalMatcher {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self::with_chunk_size(store, DEFAULT_IDENTIFIER_CHUNK_SIZE)
    }

    pub fn with_chunk_size(store: Arc<dyn ContactStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// 查询命中任一邮箱或电话的活跃联系人（按 id 去重、升序）
    pub async fn find_contacts_by_identifiers(
        &self,
        emails: &[String],
        phones: &[String],
    ) -> RepositoryResult<Vec<Contact>> {
        let mut found: BTreeMap<i64, Contact> = BTreeMap::new();

        for chunk in emails.chunks(self.chunk_size) {
            for contact in self.store.find_active_by_identifiers(chunk, &[]).await? {
                found.entry(contact.id).or_insert(contact);
            }
        }
        for chunk in phones.chunks(self.chunk_size) {
            for contact in self.store.find_active_by_identifiers(&[], chunk).await? {
                found.entry(contact.id).or_insert(contact);
            }
        }

        Ok(found.into_values().filter(|c| c.is_live()).collect())
    }

    /// 单组标识的外部匹配归类
    pub async fn classify(&self, identifiers: &NormalizedIdentifiers) -> RepositoryResult<ExistingRecordMatch> {
        if identifiers.is_empty() {
            return Ok(ExistingRecordMatch::None);
        }
        let emails: Vec<String> = identifiers.emails.iter().cloned().collect();
        let phones: Vec<String> = identifiers.phones.iter().cloned().collect();
        let contacts = self.find_contacts_by_identifiers(&emails, &phones).await?;
        Ok(ExistingRecordMatch::from_contacts(contacts))
    }

    /// 整批外部匹配: 合并全部分组标识查询一次，再在内存中按标识归属分配
    ///
    /// # 返回
    /// - group_id → 匹配结果（每个输入分组都有一项）
    #[instrument(skip(self, groups), fields(group_count = groups.len()))]
    pub async fn match_groups(
        &self,
        groups: &[DuplicateGroup],
    ) -> RepositoryResult<BTreeMap<String, ExistingRecordMatch>> {
        let mut all_emails: BTreeSet<String> = BTreeSet::new();
        let mut all_phones: BTreeSet<String> = BTreeSet::new();
        for group in groups {
            all_emails.extend(group.identifiers.emails.iter().cloned());
            all_phones.extend(group.identifiers.phones.iter().cloned());
        }

        let emails: Vec<String> = all_emails.into_iter().collect();
        let phones: Vec<String> = all_phones.into_iter().collect();
        let contacts = self.find_contacts_by_identifiers(&emails, &phones).await?;

        debug!(
            email_count = emails.len(),
            phone_count = phones.len(),
            contact_count = contacts.len(),
            "外部匹配查询完成"
        );

        let matches = groups
            .iter()
            .map(|group| {
                let hits: Vec<Contact> = contacts
                    .iter()
                    .filter(|c| group.identifiers.matches_contact(c))
                    .cloned()
                    .collect();
                (group.group_id.clone(), ExistingRecordMatch::from_contacts(hits))
            })
            .collect();

        Ok(matches)
    }
}
