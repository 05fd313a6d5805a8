// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use contact_dedup::config::ConfigManager;
use contact_dedup::db::{open_shared_connection, SharedConnection};
use contact_dedup::domain::{Contact, ContactRecord, RawRow};
use contact_dedup::engine::draft_from_record;
use contact_dedup::repository::{ContactRepositoryImpl, ContactStore};
use contact_dedup::ImportApi;
use std::error::Error;
use std::io::Write;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非 UTF-8")?.to_string();

    // 建库
    open_shared_connection(&db_path)?;

    Ok((temp_file, db_path))
}

/// 创建临时数据库 + 共享连接 + ImportApi
pub fn create_test_api() -> Result<(NamedTempFile, SharedConnection, ImportApi), Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let conn = open_shared_connection(&db_path)?;
    let api = ImportApi::from_connection(conn.clone());
    Ok((temp_file, conn, api))
}

/// 写入配置项
pub fn insert_test_config(conn: &SharedConnection, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    ConfigManager::from_connection(conn.clone()).set_global_config_value(key, value)
}

/// 写入已有联系人
pub async fn seed_contact(
    conn: &SharedConnection,
    pairs: &[(&str, &str)],
) -> Result<Contact, Box<dyn Error>> {
    let mut record = ContactRecord::new(0);
    for (k, v) in pairs {
        record.set_value(k, Some(v.to_string()));
    }
    let store = ContactRepositoryImpl::new(conn.clone());
    Ok(store.create(&draft_from_record(&record)).await?)
}

/// 生成临时 CSV 文件
pub fn write_csv(lines: &[&str]) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    Ok(file)
}

/// 构造原始行（列顺序与 headers 一致）
pub fn raw_rows(headers: &[&str], rows: &[&[&str]]) -> (Vec<String>, Vec<RawRow>) {
    let header_vec: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let raw = rows
        .iter()
        .enumerate()
        .map(|(idx, cells)| {
            let pairs: Vec<(&str, &str)> = headers.iter().copied().zip(cells.iter().copied()).collect();
            RawRow::from_pairs(idx + 1, &pairs)
        })
        .collect();
    (header_vec, raw)
}
