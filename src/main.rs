// ==========================================
// 联系人导入去重系统 - 命令行入口
// ==========================================
// 用法:
//   contact-dedup validate <file> [user_id] [db_path]
//   contact-dedup audit <validation_id> [db_path]
//
// db_path 缺省时使用 CONTACT_DEDUP_DB_PATH 或用户数据目录
// ==========================================

use contact_dedup::config::default_db_path;
use contact_dedup::domain::AuditLogFilter;
use contact_dedup::{logging, ImportApi};

const USAGE: &str = "用法:\n  contact-dedup validate <file> [user_id] [db_path]\n  contact-dedup audit <validation_id> [db_path]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or(USAGE)?;

    match command.as_str() {
        "validate" => {
            let file = args.next().ok_or(USAGE)?;
            let user_id = args.next().unwrap_or_else(|| "cli".to_string());
            let db_path = args.next().unwrap_or_else(default_db_path);

            tracing::info!(db_path = %db_path, "使用数据库");
            let api = ImportApi::new(&db_path)?;
            let summary = api.validate_file(&user_id, &file, None).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "audit" => {
            let validation_id = args.next().ok_or(USAGE)?;
            let db_path = args.next().unwrap_or_else(default_db_path);

            let api = ImportApi::new(&db_path)?;
            let page = api
                .list_audit_logs(&AuditLogFilter {
                    validation_id: Some(validation_id),
                    ..AuditLogFilter::default()
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        other => {
            eprintln!("未知命令: {}\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
