// ==========================================
// 联系人导入去重系统 - API 层
// ==========================================
// 职责: 对外业务接口（校验、执行、审计查询、合并预览）
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
