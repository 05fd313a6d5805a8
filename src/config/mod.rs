// ==========================================
// 联系人导入去重系统 - 配置层
// ==========================================
// 职责: 去重流程配置读取
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod dedup_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, default_db_path, ConfigManager};
pub use dedup_config_trait::{ConfigResult, DedupConfigReader, EngineConfig};
