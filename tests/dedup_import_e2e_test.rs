// ==========================================
// 导入去重端到端测试
// ==========================================
// 测试目标: 文件 → 校验汇总 → 人工决策 → 写入 → 审计
// ==========================================

mod test_helpers;

use contact_dedup::api::ApiError;
use contact_dedup::config::config_keys;
use contact_dedup::domain::{
    AuditActionType, AuditLogFilter, DecisionStatus, DuplicateType, ExecuteRequest, MatchKind,
    MergeDecision,
};
use contact_dedup::logging;
use contact_dedup::repository::{ContactRepositoryImpl, ContactStore};
use std::collections::BTreeMap;

fn request(validation_id: &str, decisions: Vec<MergeDecision>) -> ExecuteRequest {
    ExecuteRequest {
        validation_id: validation_id.to_string(),
        user_id: "alice".to_string(),
        field_mapping: BTreeMap::new(),
        decisions,
        tag_ids: vec![],
    }
}

#[tokio::test]
async fn test_csv_validate_then_execute() {
    logging::init_test();
    let (_db, conn, api) = test_helpers::create_test_api().unwrap();
    let known = test_helpers::seed_contact(
        &conn,
        &[("email", "known@x.com"), ("first_name", "Known"), ("city", "Paris")],
    )
    .await
    .unwrap();

    let csv = test_helpers::write_csv(&[
        "First Name,Last Name,Email,Phone,Company",
        "Ann,,,555-123-4567,",
        ",,a@x.com,(555) 123-4567,Acme",
        "John,Doe,john@x.com,,",
        ",,JOHN@X.com,,",
        "Known,Person,known@x.com,,Newco",
        "Bad,Row,bad-email,,",
        "Short,Phone,,123,",
    ])
    .unwrap();

    // === 校验 ===
    let summary = api
        .validate_file("alice", csv.path().to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(summary.total_rows, 7);
    let rows = |v: Vec<usize>| v;
    assert_eq!(rows(summary.new_rows.iter().map(|r| r.row_number).collect()), vec![7]);
    assert_eq!(
        rows(summary.duplicate_rows.iter().map(|r| r.row_number).collect()),
        vec![1, 2, 3, 4, 5]
    );
    assert!(summary.conflict_rows.is_empty());
    assert_eq!(summary.invalid_rows[0].row_number, 6);

    // 不同格式的同一电话归为一组
    let phone_group = summary.group("grp_0001").unwrap();
    assert_eq!(phone_group.row_numbers, vec![1, 2]);
    assert_eq!(phone_group.merged.record.email.as_deref(), Some("a@x.com"));
    assert_eq!(phone_group.merged.record.first_name.as_deref(), Some("Ann"));

    let external = summary.group("grp_0003").unwrap();
    assert_eq!(external.classification, MatchKind::Single);
    assert_eq!(external.candidate_contact_ids, vec![known.id]);
    let row5 = summary.duplicate_rows.iter().find(|r| r.row_number == 5).unwrap();
    assert_eq!(row5.duplicate_type, DuplicateType::External);

    // 无法规范化的电话: 行照常导入，但带警告
    assert_eq!(summary.new_rows[0].warnings.len(), 1);

    // === 预览 ===
    let preview = api.preview_group(&summary.validation_id, "grp_0003").await.unwrap();
    let company = preview.preview.iter().find(|p| p.field == "company").unwrap();
    assert_eq!(company.db_value, None);
    assert_eq!(company.merged_value.as_deref(), Some("Newco"));
    assert!(company.changed);

    // === 执行 ===
    let result = api
        .execute_import(&request(
            &summary.validation_id,
            vec![MergeDecision::update("grp_0003", None)],
        ))
        .await
        .unwrap();

    assert_eq!(result.created, 3);
    assert_eq!(result.updated, 1);
    assert_eq!(result.failed, 0);

    let store = ContactRepositoryImpl::new(conn.clone());
    let merged = store.find_active_by_phone("+15551234567", None).await.unwrap().unwrap();
    assert_eq!(merged.email.as_deref(), Some("a@x.com"));
    assert_eq!(merged.company.as_deref(), Some("Acme"));

    let john = store.find_active_by_email("john@x.com", None).await.unwrap().unwrap();
    assert_eq!(john.last_name.as_deref(), Some("Doe"));

    let updated = store.get_by_id(known.id).await.unwrap().unwrap();
    assert_eq!(updated.company.as_deref(), Some("Newco"));
    assert_eq!(updated.last_name.as_deref(), Some("Person"));
    assert_eq!(updated.city.as_deref(), Some("Paris"));

    // === 审计 ===
    let page = api
        .list_audit_logs(&AuditLogFilter {
            validation_id: Some(summary.validation_id.clone()),
            ..AuditLogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.entries[0].action_type, AuditActionType::Import);
    assert_eq!(page.entries[1].action_type, AuditActionType::Decision);
    assert_eq!(page.entries[1].user_id, "alice");
}

#[tokio::test]
async fn test_internal_merge_prefers_most_complete_row() {
    let (_db, _conn, api) = test_helpers::create_test_api().unwrap();
    let (headers, rows) = test_helpers::raw_rows(
        &["email", "name"],
        &[&["JOHN@X.com", ""], &["john@x.com", "John Doe"]],
    );

    let summary = api.validate_rows("alice", None, &headers, rows, None).await.unwrap();

    assert_eq!(summary.groups.len(), 1);
    let merged = &summary.groups[0].merged;
    assert_eq!(merged.record.email.as_deref(), Some("john@x.com"));
    assert_eq!(merged.record.first_name.as_deref(), Some("John"));
    assert_eq!(merged.record.last_name.as_deref(), Some("Doe"));
    assert_eq!(merged.source_rows, vec![1, 2]);
}

#[tokio::test]
async fn test_explicit_mapping_and_overflow_columns() {
    let (_db, conn, api) = test_helpers::create_test_api().unwrap();
    let (headers, rows) = test_helpers::raw_rows(
        &["Correo", "Tel", "Ignored", "Favourite Color"],
        &[&["ana@x.com", "5550001111", "zzz", "blue"]],
    );
    let mut mapping = BTreeMap::new();
    mapping.insert("Correo".to_string(), "email".to_string());
    mapping.insert("Tel".to_string(), "phone".to_string());
    mapping.insert("Ignored".to_string(), "skip".to_string());

    let summary = api
        .validate_rows("alice", Some("rows.json"), &headers, rows, Some(&mapping))
        .await
        .unwrap();
    let record = &summary.new_rows[0].record;
    assert_eq!(record.email.as_deref(), Some("ana@x.com"));
    assert_eq!(record.extra.get("Favourite Color").map(String::as_str), Some("blue"));
    assert!(!record.extra.contains_key("Ignored"));

    let result = api.execute_import(&request(&summary.validation_id, vec![])).await.unwrap();
    assert_eq!(result.created, 1);

    let store = ContactRepositoryImpl::new(conn);
    let created = store.get_by_id(result.outcomes[0].contact_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(created.normalized_phone.as_deref(), Some("+15550001111"));
    assert_eq!(created.extra.get("Favourite Color").map(String::as_str), Some("blue"));
}

#[tokio::test]
async fn test_session_can_only_be_executed_once() {
    let (_db, _conn, api) = test_helpers::create_test_api().unwrap();
    let (headers, rows) = test_helpers::raw_rows(&["email"], &[&["once@x.com"]]);
    let summary = api.validate_rows("alice", None, &headers, rows, None).await.unwrap();

    let req = request(&summary.validation_id, vec![]);
    api.execute_import(&req).await.unwrap();

    match api.execute_import(&req).await {
        Err(ApiError::AlreadyExecuted(id)) => assert_eq!(id, summary.validation_id),
        other => panic!("unexpected: {:?}", other.map(|r| r.created)),
    }
    assert!(matches!(
        api.execute_import(&request("missing", vec![])).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_audit_outage_still_returns_committed_outcomes() {
    let (_db, conn, api) = test_helpers::create_test_api().unwrap();
    let (headers, rows) = test_helpers::raw_rows(&["email"], &[&["one@x.com"], &["two@x.com"]]);
    let summary = api.validate_rows("alice", None, &headers, rows, None).await.unwrap();

    conn.lock()
        .unwrap()
        .execute_batch("ALTER TABLE audit_log RENAME TO audit_log_moved")
        .unwrap();

    let result = api
        .execute_import(&request(&summary.validation_id, vec![]))
        .await
        .unwrap();

    assert_eq!(result.created, 2);
    assert!(result.outcomes.iter().all(|o| o.status == DecisionStatus::Created));
    assert!(result.audit_ids.is_empty());
    assert_eq!(result.audit_failures.len(), 1);
    assert_eq!(result.audit_failures[0].action_type, AuditActionType::Import);

    let store = ContactRepositoryImpl::new(conn.clone());
    for outcome in &result.outcomes {
        let id = outcome.contact_id.unwrap();
        assert!(store.get_by_id(id).await.unwrap().is_some());
    }

    // 会话已被领取，不会重复写入
    assert!(matches!(
        api.execute_import(&request(&summary.validation_id, vec![])).await,
        Err(ApiError::AlreadyExecuted(_))
    ));
}

#[tokio::test]
async fn test_configured_default_strategy_applies_to_updates() {
    let (_db, conn, api) = test_helpers::create_test_api().unwrap();
    test_helpers::insert_test_config(&conn, config_keys::DEFAULT_MERGE_STRATEGY, "fill_empty").unwrap();
    let existing = test_helpers::seed_contact(&conn, &[("email", "k@x.com"), ("first_name", "Kept")])
        .await
        .unwrap();

    let (headers, rows) = test_helpers::raw_rows(
        &["email", "first_name", "company"],
        &[&["k@x.com", "Replaced", "Acme"]],
    );
    let summary = api.validate_rows("alice", None, &headers, rows, None).await.unwrap();
    let result = api
        .execute_import(&request(
            &summary.validation_id,
            vec![MergeDecision::update("grp_0001", Some(existing.id))],
        ))
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].status, DecisionStatus::Updated);

    let store = ContactRepositoryImpl::new(conn);
    let after = store.get_by_id(existing.id).await.unwrap().unwrap();
    assert_eq!(after.first_name.as_deref(), Some("Kept"));
    assert_eq!(after.company.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn test_malformed_strategy_config_is_fatal() {
    let (_db, conn, api) = test_helpers::create_test_api().unwrap();
    test_helpers::insert_test_config(&conn, config_keys::DEFAULT_MERGE_STRATEGY, "newest_wins").unwrap();
    let (headers, rows) = test_helpers::raw_rows(&["email"], &[&["x@x.com"]]);
    let summary = api.validate_rows("alice", None, &headers, rows, None).await.unwrap();

    let err = api.execute_import(&request(&summary.validation_id, vec![])).await;
    assert!(matches!(err, Err(ApiError::ConfigError(_))));
}

#[tokio::test]
async fn test_validate_files_isolates_failures() {
    let (_db, _conn, api) = test_helpers::create_test_api().unwrap();
    let a = test_helpers::write_csv(&["email", "a@x.com"]).unwrap();
    let b = test_helpers::write_csv(&["email", "b@x.com", "c@x.com"]).unwrap();

    let results = api
        .validate_files(
            "alice",
            &[
                a.path().to_str().unwrap().to_string(),
                "/nonexistent/contacts.csv".to_string(),
                b.path().to_str().unwrap().to_string(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().total_rows, 1);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().total_rows, 2);
}

#[tokio::test]
async fn test_tags_attach_to_written_contacts() {
    let (_db, conn, api) = test_helpers::create_test_api().unwrap();
    let (headers, rows) = test_helpers::raw_rows(&["email"], &[&["t1@x.com"], &["t2@x.com"]]);
    let summary = api.validate_rows("alice", None, &headers, rows, None).await.unwrap();

    let mut req = request(&summary.validation_id, vec![]);
    req.tag_ids = vec![3];
    let result = api.execute_import(&req).await.unwrap();
    assert_eq!(result.created, 2);

    let links: i64 = conn
        .lock()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM contact_tags WHERE tag_id = 3", [], |r| r.get(0))
        .unwrap();
    assert_eq!(links, 2);
}
