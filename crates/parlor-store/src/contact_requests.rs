use chrono::{DateTime, Utc};
use parlor_shared::ContactRequestId;
use rusqlite::params;

use crate::convert::{get_id, get_opt_ts, get_ts, opt_ts, ts};
use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::ContactRequest;

const CONTACT_COLUMNS: &str = "id, name, email, message, is_read, read_at, created_at, deleted_at";

impl Database {
    pub fn insert_contact_request(&self, request: &ContactRequest) -> Result<()> {
        self.conn().execute(
            "INSERT INTO contact_requests (id, name, email, message, is_read, read_at, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                request.id.to_string(),
                request.name,
                request.email,
                request.message,
                request.is_read,
                opt_ts(&request.read_at),
                ts(&request.created_at),
                opt_ts(&request.deleted_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_contact_request(&self, id: ContactRequestId) -> Result<ContactRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contact_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_contact_request,
            )
            .map_err(not_found)
    }

    /// Live inbox items, newest first.
    pub fn list_contact_requests(&self, limit: u32, offset: u32) -> Result<Vec<ContactRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contact_requests
             WHERE deleted_at IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT ?1 OFFSET ?2"
        ))?;

        let rows = stmt.query_map(params![limit, offset], row_to_contact_request)?;
        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    pub fn mark_contact_request_read(&self, id: ContactRequestId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE contact_requests SET is_read = 1, read_at = ?2
             WHERE id = ?1 AND is_read = 0 AND deleted_at IS NULL",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    pub fn soft_delete_contact_request(&self, id: ContactRequestId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE contact_requests SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_contact_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRequest> {
    Ok(ContactRequest {
        id: get_id(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        read_at: get_opt_ts(row, 5)?,
        created_at: get_ts(row, 6)?,
        deleted_at: get_opt_ts(row, 7)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::convert::now;

    pub(crate) fn submit(db: &Database) -> ContactRequest {
        let request = ContactRequest {
            id: ContactRequestId::new(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            message: "call me".into(),
            is_read: false,
            read_at: None,
            created_at: now(),
            deleted_at: None,
        };
        db.insert_contact_request(&request).unwrap();
        request
    }

    #[test]
    fn inbox_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let first = submit(&db);
        let second = submit(&db);

        assert_eq!(db.list_contact_requests(50, 0).unwrap().len(), 2);
        assert_eq!(db.get_contact_request(first.id).unwrap(), first);

        assert!(db.mark_contact_request_read(first.id, now()).unwrap());
        assert!(!db.mark_contact_request_read(first.id, now()).unwrap());
        assert!(db.get_contact_request(first.id).unwrap().is_read);

        assert!(db.soft_delete_contact_request(second.id, now()).unwrap());
        assert!(!db.soft_delete_contact_request(second.id, now()).unwrap());
        let live = db.list_contact_requests(50, 0).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, first.id);
    }
}
