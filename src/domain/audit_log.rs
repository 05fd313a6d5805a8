// ==========================================
// 联系人导入去重系统 - 审计日志领域模型
// ==========================================
// 依据: audit_log 表
// 红线: 只追加,不修改,不删除；必须在写入成功之后记录
// ==========================================

use crate::domain::types::AuditActionType;
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// AuditLogEntry - 审计日志
// ==========================================
// 对齐: audit_log 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub audit_id: String,                   // 日志ID (UUID)
    pub validation_id: Option<String>,      // 关联校验会话
    pub user_id: String,                    // 操作人
    pub action_type: AuditActionType,       // 操作类型
    pub duplicate_group_id: Option<String>, // 关联重复分组
    pub decision: Option<String>,           // 决策值 (update/skip)
    pub rows_affected: i64,                 // 影响行数
    pub details_json: Option<JsonValue>,    // 详细信息 (JSON)
    pub created_at: NaiveDateTime,          // 记录时间
}

impl AuditLogEntry {
    /// 创建新的审计日志
    ///
    /// # 参数
    /// - `validation_id`: 关联校验会话 (可选)
    /// - `user_id`: 操作人
    /// - `action_type`: 操作类型
    pub fn new(validation_id: Option<String>, user_id: &str, action_type: AuditActionType) -> Self {
        Self {
            audit_id: uuid::Uuid::new_v4().to_string(),
            validation_id,
            user_id: user_id.to_string(),
            action_type,
            duplicate_group_id: None,
            decision: None,
            rows_affected: 0,
            details_json: None,
            created_at: chrono::Utc::now().naive_utc().trunc_subsecs(6),
        }
    }

    pub fn with_group(mut self, group_id: Option<String>) -> Self {
        self.duplicate_group_id = group_id;
        self
    }

    pub fn with_decision(mut self, decision: &str) -> Self {
        self.decision = Some(decision.to_string());
        self
    }

    pub fn with_rows_affected(mut self, rows: i64) -> Self {
        self.rows_affected = rows;
        self
    }

    /// 设置详细信息 (转换为JSON)
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details_json = serde_json::to_value(details).ok();
        self
    }
}

// ==========================================
// AuditLogFilter - 审计查询条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLogFilter {
    pub validation_id: Option<String>,
    pub user_id: Option<String>,
    pub action_type: Option<AuditActionType>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub limit: i64,
    pub offset: i64,
}

// ==========================================
// AuditLogPage - 分页结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogPage {
    pub entries: Vec<AuditLogEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
