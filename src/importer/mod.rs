// ==========================================
// 联系人导入去重系统 - 导入层
// ==========================================
// 职责: 外部联系人数据的校验与执行
// 支持: Excel, CSV, 已解析的行
// ==========================================

// 模块声明
pub mod contact_importer_impl;
pub mod contact_importer_trait;
pub mod decision_executor;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod summary_builder;

// 重导出核心类型
pub use contact_importer_impl::DedupImporterImpl;
pub use decision_executor::DecisionExecutor;
pub use dq_validator::DqValidator;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{FieldMapping, MappedRow};
pub use file_parser::{CsvParser, ExcelParser, ParsedFile, UniversalFileParser};
pub use summary_builder::{BuiltSummary, RowAssessment, SummaryBuilder};

// 重导出 Trait 接口
pub use contact_importer_trait::{DedupImporter, FileParser};
