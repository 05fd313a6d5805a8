// ==========================================
// 联系人导入去重系统 - 审计日志数据仓储
// ==========================================
// 依据: audit_log 表（只追加）
// 红线: 仓储只提供插入与查询，不提供修改/删除入口
// ==========================================

mod core;
mod queries;


pub use core::AuditLogRepository;
