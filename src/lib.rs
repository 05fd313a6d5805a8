// ==========================================
// 联系人导入去重系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 导入去重 + 人工决策 + 审计追溯
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 规范化/分组/合并/匹配/冲突检测
pub mod engine;

// 导入层 - 校验与执行
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AuditActionType, DecisionAction, MatchKind, MergeStrategy};

// 领域实体
pub use domain::{
    AuditLogEntry, Contact, ContactRecord, DuplicateGroup, ExecuteRequest, ExecuteResult,
    MergeDecision, ValidationSummary,
};

// 引擎
pub use engine::{ConflictDetector, DuplicateGrouper, ExternalMatcher};

// 导入
pub use importer::{DedupImporter, DedupImporterImpl};

// API
pub use api::ImportApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "联系人导入去重系统";
