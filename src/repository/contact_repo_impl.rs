// ==========================================
// 联系人导入去重系统 - 联系人存储实现
// ==========================================
// 职责: ContactStore 的 rusqlite 实现
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 所有查询使用参数化
// ==========================================

use crate::db::SharedConnection;
use crate::domain::contact::{Contact, ContactDraft};
use crate::repository::contact_store::ContactStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_ts, parse_ts, placeholders};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::sync::MutexGuard;

const CONTACT_COLUMNS: &str = "id, first_name, last_name, email, phone, normalized_phone, \
     company, job_title, address, city, state, postal_code, country, birthday, notes, \
     extra_json, is_active, is_deleted, created_at, updated_at";

// ==========================================
// ContactRepositoryImpl
// ==========================================
pub struct ContactRepositoryImpl {
    conn: SharedConnection,
}

impl ContactRepositoryImpl {
    /// 从已有连接创建
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<Contact> {
        let extra_json: Option<String> = row.get(15)?;
        let extra: BTreeMap<String, String> = match extra_json {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(15, rusqlite::types::Type::Text, Box::new(e))
            })?,
            _ => BTreeMap::new(),
        };
        let created_at: String = row.get(18)?;
        let updated_at: String = row.get(19)?;

        Ok(Contact {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            normalized_phone: row.get(5)?,
            company: row.get(6)?,
            job_title: row.get(7)?,
            address: row.get(8)?,
            city: row.get(9)?,
            state: row.get(10)?,
            postal_code: row.get(11)?,
            country: row.get(12)?,
            birthday: row.get(13)?,
            notes: row.get(14)?,
            extra,
            is_active: row.get::<_, i64>(16)? != 0,
            is_deleted: row.get::<_, i64>(17)? != 0,
            created_at: parse_ts(18, &created_at)?,
            updated_at: parse_ts(19, &updated_at)?,
        })
    }

    fn fetch_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<Contact>> {
        let sql = format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS);
        let contact = conn
            .query_row(&sql, params![id], Self::map_row)
            .optional()?;
        Ok(contact)
    }

    fn fetch_active_by_column(
        &self,
        column: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> RepositoryResult<Option<Contact>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM contacts
             WHERE {} = ?1 AND is_active = 1 AND is_deleted = 0
               AND (?2 IS NULL OR id <> ?2)
             ORDER BY id
             LIMIT 1",
            CONTACT_COLUMNS, column
        );
        let contact = conn
            .query_row(&sql, params![value, exclude_id], Self::map_row)
            .optional()?;
        Ok(contact)
    }

    fn extra_json(draft: &ContactDraft) -> RepositoryResult<Option<String>> {
        if draft.record.extra.is_empty() {
            Ok(None)
        } else {
            Ok(Some(serde_json::to_string(&draft.record.extra)?))
        }
    }
}

#[async_trait]
impl ContactStore for ContactRepositoryImpl {
    async fn find_active_by_identifiers(
        &self,
        emails: &[String],
        phones: &[String],
    ) -> RepositoryResult<Vec<Contact>> {
        if emails.is_empty() && phones.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses = Vec::new();
        if !emails.is_empty() {
            clauses.push(format!("email IN ({})", placeholders(emails.len())));
        }
        if !phones.is_empty() {
            clauses.push(format!("normalized_phone IN ({})", placeholders(phones.len())));
        }

        let sql = format!(
            "SELECT {} FROM contacts
             WHERE is_active = 1 AND is_deleted = 0 AND ({})
             ORDER BY id",
            CONTACT_COLUMNS,
            clauses.join(" OR ")
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(params_from_iter(emails.iter().chain(phones.iter())), Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(contacts)
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        exclude_id: Option<i64>,
    ) -> RepositoryResult<Option<Contact>> {
        self.fetch_active_by_column("email", email, exclude_id)
    }

    async fn find_active_by_phone(
        &self,
        normalized_phone: &str,
        exclude_id: Option<i64>,
    ) -> RepositoryResult<Option<Contact>> {
        self.fetch_active_by_column("normalized_phone", normalized_phone, exclude_id)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Option<Contact>> {
        let conn = self.get_conn()?;
        Self::fetch_by_id(&conn, id)
    }

    async fn create(&self, draft: &ContactDraft) -> RepositoryResult<Contact> {
        let extra_json = Self::extra_json(draft)?;
        let now = format_ts(&chrono::Utc::now().naive_utc());
        let r = &draft.record;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO contacts (
                first_name, last_name, email, phone, normalized_phone,
                company, job_title, address, city, state, postal_code, country,
                birthday, notes, extra_json, is_active, is_deleted, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1, 0, ?16, ?16)
            "#,
            params![
                r.first_name,
                r.last_name,
                draft.email,
                r.phone,
                draft.normalized_phone,
                r.company,
                r.job_title,
                r.address,
                r.city,
                r.state,
                r.postal_code,
                r.country,
                r.birthday,
                r.notes,
                extra_json,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::fetch_by_id(&conn, id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Contact".to_string(),
            id: id.to_string(),
        })
    }

    async fn update(&self, id: i64, draft: &ContactDraft) -> RepositoryResult<Contact> {
        let extra_json = Self::extra_json(draft)?;
        let now = format_ts(&chrono::Utc::now().naive_utc());
        let r = &draft.record;

        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE contacts SET
                first_name = ?1, last_name = ?2, email = ?3, phone = ?4, normalized_phone = ?5,
                company = ?6, job_title = ?7, address = ?8, city = ?9, state = ?10,
                postal_code = ?11, country = ?12, birthday = ?13, notes = ?14,
                extra_json = ?15, updated_at = ?16
            WHERE id = ?17
            "#,
            params![
                r.first_name,
                r.last_name,
                draft.email,
                r.phone,
                draft.normalized_phone,
                r.company,
                r.job_title,
                r.address,
                r.city,
                r.state,
                r.postal_code,
                r.country,
                r.birthday,
                r.notes,
                extra_json,
                now,
                id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Contact".to_string(),
                id: id.to_string(),
            });
        }

        Self::fetch_by_id(&conn, id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Contact".to_string(),
            id: id.to_string(),
        })
    }

    async fn add_tags(&self, contact_id: i64, tag_ids: &[i64]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for tag_id in tag_ids {
            count += tx.execute(
                "INSERT OR IGNORE INTO contact_tags (contact_id, tag_id) VALUES (?1, ?2)",
                params![contact_id, tag_id],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;
    use crate::domain::contact::ContactRecord;

    fn draft(email: Option<&str>, phone: Option<&str>, first_name: &str) -> ContactDraft {
        let mut record = ContactRecord::new(0);
        record.first_name = Some(first_name.to_string());
        record.email = email.map(|s| s.to_string());
        record.phone = phone.map(|s| s.to_string());
        ContactDraft {
            record,
            email: email.map(|s| s.to_string()),
            normalized_phone: phone.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_id() {
        let repo = ContactRepositoryImpl::new(open_in_memory_shared().unwrap());

        let created = repo
            .create(&draft(Some("a@x.com"), Some("+15551234567"), "Ann"))
            .await
            .unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(found.email.as_deref(), Some("a@x.com"));
        assert_eq!(found.normalized_phone.as_deref(), Some("+15551234567"));
        assert!(found.is_live());
    }

    #[tokio::test]
    async fn test_find_active_by_identifiers_skips_soft_deleted() {
        let conn = open_in_memory_shared().unwrap();
        let repo = ContactRepositoryImpl::new(conn.clone());

        let a = repo.create(&draft(Some("a@x.com"), None, "Ann")).await.unwrap();
        repo.create(&draft(None, Some("+15550000000"), "Bob")).await.unwrap();
        conn.lock()
            .unwrap()
            .execute("UPDATE contacts SET is_deleted = 1 WHERE id = ?1", params![a.id])
            .unwrap();

        let found = repo
            .find_active_by_identifiers(
                &["a@x.com".to_string()],
                &["+15550000000".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn test_create_duplicate_email_is_unique_violation() {
        let repo = ContactRepositoryImpl::new(open_in_memory_shared().unwrap());
        repo.create(&draft(Some("a@x.com"), None, "Ann")).await.unwrap();

        let err = repo
            .create(&draft(Some("a@x.com"), None, "Other"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_find_active_by_email_excludes_self() {
        let repo = ContactRepositoryImpl::new(open_in_memory_shared().unwrap());
        let a = repo.create(&draft(Some("a@x.com"), None, "Ann")).await.unwrap();

        assert!(repo.find_active_by_email("a@x.com", Some(a.id)).await.unwrap().is_none());
        assert_eq!(
            repo.find_active_by_email("a@x.com", None).await.unwrap().map(|c| c.id),
            Some(a.id)
        );
    }

    #[tokio::test]
    async fn test_add_tags_ignores_existing() {
        let repo = ContactRepositoryImpl::new(open_in_memory_shared().unwrap());
        let a = repo.create(&draft(Some("a@x.com"), None, "Ann")).await.unwrap();

        assert_eq!(repo.add_tags(a.id, &[1, 2]).await.unwrap(), 2);
        assert_eq!(repo.add_tags(a.id, &[2, 3]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_contact_is_not_found() {
        let repo = ContactRepositoryImpl::new(open_in_memory_shared().unwrap());
        let err = repo
            .update(999, &draft(Some("z@x.com"), None, "Zed"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
