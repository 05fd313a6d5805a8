// ==========================================
// 联系人导入去重系统 - 去重配置读取 Trait
// ==========================================
// 职责: 定义去重流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::contact::ContactField;
use crate::domain::types::MergeStrategy;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// DedupConfigReader Trait
// ==========================================
// 实现者: ConfigManager（config_kv 表）/ EngineConfig（内存）
#[async_trait]
pub trait DedupConfigReader: Send + Sync {
    /// 决策未指定策略时使用的合并策略
    ///
    /// # 默认值
    /// - csv_priority
    async fn get_default_merge_strategy(&self) -> ConfigResult<MergeStrategy>;

    /// 必填字段列表（为空则不检查）
    async fn get_required_fields(&self) -> ConfigResult<Vec<ContactField>>;

    /// 单次 IN 查询的标识数量上限
    ///
    /// # 默认值
    /// - 500
    async fn get_identifier_chunk_size(&self) -> ConfigResult<usize>;

    /// 审计查询单页上限
    ///
    /// # 默认值
    /// - 200
    async fn get_audit_max_page_size(&self) -> ConfigResult<i64>;
}

// ==========================================
// EngineConfig - 内存配置
// ==========================================
// 用途: 测试与嵌入式调用，不依赖 config_kv
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub default_merge_strategy: MergeStrategy,
    pub required_fields: Vec<ContactField>,
    pub identifier_chunk_size: usize,
    pub audit_max_page_size: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_merge_strategy: MergeStrategy::CsvPriority,
            required_fields: Vec::new(),
            identifier_chunk_size: 500,
            audit_max_page_size: 200,
        }
    }
}

#[async_trait]
impl DedupConfigReader for EngineConfig {
    async fn get_default_merge_strategy(&self) -> ConfigResult<MergeStrategy> {
        Ok(self.default_merge_strategy)
    }

    async fn get_required_fields(&self) -> ConfigResult<Vec<ContactField>> {
        Ok(self.required_fields.clone())
    }

    async fn get_identifier_chunk_size(&self) -> ConfigResult<usize> {
        Ok(self.identifier_chunk_size.max(1))
    }

    async fn get_audit_max_page_size(&self) -> ConfigResult<i64> {
        Ok(self.audit_max_page_size.max(1))
    }
}
