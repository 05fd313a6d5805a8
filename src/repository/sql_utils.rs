// ==========================================
// 联系人导入去重系统 - SQL 辅助函数
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::types::Type;

/// 时间戳存储格式（微秒精度，保证同秒内写入的审计记录可排序）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 解析时间戳（兼容无小数秒的历史数据）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 生成 IN 子句占位符: "?,?,?"
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?,?,?");
        assert_eq!(placeholders(0), "");
    }

    #[test]
    fn test_parse_ts_accepts_both_precisions() {
        assert!(parse_ts(0, "2025-01-15 10:00:00").is_ok());
        assert!(parse_ts(0, "2025-01-15 10:00:00.123456").is_ok());
        assert!(parse_ts(0, "15/01/2025").is_err());
    }
}
