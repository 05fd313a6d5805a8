// ==========================================
// 联系人导入去重系统 - 导入去重 Trait
// ==========================================
// 职责: 定义校验/执行两阶段接口（不包含实现）
// 红线: 校验阶段不写联系人；执行阶段按决策逐条提交
// ==========================================

use crate::domain::dedup::RawRow;
use crate::domain::validation::{ExecuteRequest, ExecuteResult, ValidationSummary};
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ParsedFile;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ==========================================
// DedupImporter Trait
// ==========================================
// 用途: 导入去重主接口
// 实现者: DedupImporterImpl
#[async_trait]
pub trait DedupImporter: Send + Sync {
    /// 解析文件并生成校验汇总
    ///
    /// # 参数
    /// - user_id: 操作人
    /// - file_path: 文件路径（.csv / .xlsx / .xls）
    /// - mapping: 显式字段映射（None 时按表头自动识别）
    ///
    /// # 返回
    /// - Ok(ValidationSummary): 四类行 + 分组报告
    /// - Err: 文件读取失败、映射无效、存储错误
    async fn validate_file(
        &self,
        user_id: &str,
        file_path: &Path,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> ImportResult<ValidationSummary>;

    /// 对已解析的行生成校验汇总
    ///
    /// # 流程
    /// 1. 字段映射
    /// 2. 数据质量校验
    /// 3. 批次内分组
    /// 4. 库内匹配（分块批量查询）
    /// 5. 汇总 + 持久化会话与重复缓存
    async fn validate_rows(
        &self,
        user_id: &str,
        file_name: Option<&str>,
        headers: &[String],
        rows: Vec<RawRow>,
        mapping: Option<&BTreeMap<String, String>>,
    ) -> ImportResult<ValidationSummary>;

    /// 并发校验多个文件（互不影响）
    ///
    /// # 返回
    /// - 每个文件一条结果，顺序与输入一致
    async fn validate_files(
        &self,
        user_id: &str,
        file_paths: Vec<PathBuf>,
    ) -> ImportResult<Vec<Result<ValidationSummary, String>>>;

    /// 执行人工决策
    ///
    /// # 返回
    /// - Ok(ExecuteResult): 逐条结果，单条失败不回滚其他决策
    /// - Err(SessionNotFound / SessionAlreadyExecuted / MappingMismatch)
    async fn execute(&self, request: &ExecuteRequest) -> ImportResult<ExecuteResult>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行
    ///
    /// # 说明
    /// - 行号从 1 开始（不含表头），空白行不产出但占用行号
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<ParsedFile>;
}
