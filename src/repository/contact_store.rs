// ==========================================
// 联系人导入去重系统 - 联系人存储 Trait
// ==========================================
// 职责: 定义引擎对持久化联系人存储的全部调用（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 红线: 身份唯一性由存储层部分唯一索引最终保证
// ==========================================

use crate::domain::contact::{Contact, ContactDraft};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ContactStore Trait
// ==========================================
// 实现者: ContactRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// 按标识集合查询活跃联系人（单次 IN 查询）
    ///
    /// # 参数
    /// - emails: 规范化邮箱集合
    /// - phones: 规范化电话集合
    ///
    /// # 返回
    /// - 命中任一标识的活跃、未删除联系人（按 id 升序，不重复）
    ///
    /// # 说明
    /// - 调用方负责分块，单次传入的标识数量不应超过配置的块大小
    async fn find_active_by_identifiers(
        &self,
        emails: &[String],
        phones: &[String],
    ) -> RepositoryResult<Vec<Contact>>;

    /// 查询占用指定邮箱的活跃联系人（可排除某个 id）
    async fn find_active_by_email(
        &self,
        email: &str,
        exclude_id: Option<i64>,
    ) -> RepositoryResult<Option<Contact>>;

    /// 查询占用指定电话的活跃联系人（可排除某个 id）
    async fn find_active_by_phone(
        &self,
        normalized_phone: &str,
        exclude_id: Option<i64>,
    ) -> RepositoryResult<Option<Contact>>;

    /// 按 id 查询（包含已停用/已删除记录）
    async fn get_by_id(&self, id: i64) -> RepositoryResult<Option<Contact>>;

    /// 新建联系人
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 标识已被其他活跃联系人占用
    async fn create(&self, draft: &ContactDraft) -> RepositoryResult<Contact>;

    /// 更新联系人（整行覆盖业务字段）
    ///
    /// # 返回
    /// - Err(NotFound): 联系人不存在
    /// - Err(UniqueConstraintViolation): 标识已被其他活跃联系人占用
    async fn update(&self, id: i64, draft: &ContactDraft) -> RepositoryResult<Contact>;

    /// 给联系人打标签（已存在的关联忽略）
    ///
    /// # 返回
    /// - 新增的关联数量
    async fn add_tags(&self, contact_id: i64, tag_ids: &[i64]) -> RepositoryResult<usize>;
}
