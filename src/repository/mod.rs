// ==========================================
// 联系人导入去重系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod audit_log_repo;
pub mod contact_repo_impl;
pub mod contact_store;
pub mod duplicate_cache_repo;
pub mod error;
pub mod sql_utils;
pub mod validation_session_repo;

// 重导出核心仓储
pub use audit_log_repo::AuditLogRepository;
pub use contact_repo_impl::ContactRepositoryImpl;
pub use contact_store::ContactStore;
pub use duplicate_cache_repo::DuplicateCacheRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use validation_session_repo::ValidationSessionRepository;
