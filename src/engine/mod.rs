// ==========================================
// 联系人导入去重系统 - 引擎层
// ==========================================
// 职责: 规范化、分组、合并、匹配、冲突检测
// 红线: Engine 不拼 SQL，存储访问只经过 ContactStore
// ==========================================

pub mod conflict_detector;
pub mod grouper;
pub mod matcher;
pub mod merger;
pub mod normalizer;

// 重导出核心引擎
pub use conflict_detector::{describe_conflicts, ConflictDetector};
pub use grouper::{group_id_for, DuplicateGrouper};
pub use matcher::{ExternalMatcher, DEFAULT_IDENTIFIER_CHUNK_SIZE};
pub use merger::{
    apply_overrides, completeness_score, merge_external_duplicate, merge_group_with_existing,
    merge_internal_duplicates, preview_merge,
};
pub use normalizer::{
    draft_from_record, explode_emails, explode_phones, identifiers_of, normalize_email,
    normalize_phone, primary_email, primary_phone,
};
