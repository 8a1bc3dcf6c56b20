use chrono::{DateTime, Utc};
use parlor_shared::NotificationId;
use rusqlite::params;

use crate::convert::{get_id, get_opt_id, get_opt_ts, get_parsed, get_ts, opt_ts, ts};
use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{Notification, NotificationScope};

const NOTIFICATION_COLUMNS: &str =
    "id, owner_id, kind, title, body, is_read, read_at, created_at";

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.conn().execute(
            "INSERT INTO notifications (id, owner_id, kind, title, body, is_read, read_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id.to_string(),
                notification.owner_id.map(|o| o.to_string()),
                notification.kind.as_str(),
                notification.title,
                notification.body,
                notification.is_read,
                opt_ts(&notification.read_at),
                ts(&notification.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_notification(&self, id: NotificationId) -> Result<Notification> {
        self.conn()
            .query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                params![id.to_string()],
                row_to_notification,
            )
            .map_err(not_found)
    }

    /// Notifications visible in `scope`, newest first.
    pub fn list_notifications(
        &self,
        scope: NotificationScope,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Notification>> {
        self.select_notifications(scope, i64::from(limit), offset)
    }

    /// Every notification visible in `scope`, newest first.
    pub fn all_notifications(&self, scope: NotificationScope) -> Result<Vec<Notification>> {
        // A negative LIMIT is unbounded in SQLite.
        self.select_notifications(scope, -1, 0)
    }

    fn select_notifications(
        &self,
        scope: NotificationScope,
        limit: i64,
        offset: u32,
    ) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE {}
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
            scope.sql_filter()
        ))?;

        let rows = stmt.query_map(
            params![scope.viewer().to_string(), limit, offset],
            row_to_notification,
        )?;
        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Returns `false` if the notification was already read.
    pub fn mark_notification_read(&self, id: NotificationId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1, read_at = ?2 WHERE id = ?1 AND is_read = 0",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    /// Mark everything visible in `scope` as read. A personal scope can
    /// never reach the shared system-wide rows.
    pub fn mark_all_notifications_read(&self, scope: NotificationScope, at: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            &format!(
                "UPDATE notifications SET is_read = 1, read_at = ?2
                 WHERE is_read = 0 AND {}",
                scope.sql_filter()
            ),
            params![scope.viewer().to_string(), ts(&at)],
        )?;
        Ok(affected)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: get_id(row, 0)?,
        owner_id: get_opt_id(row, 1)?,
        kind: get_parsed(row, 2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        is_read: row.get(5)?,
        read_at: get_opt_ts(row, 6)?,
        created_at: get_ts(row, 7)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::convert::now;
    use crate::models::NotificationKind;
    use parlor_shared::UserId;

    pub(crate) fn notify(db: &Database, owner: Option<UserId>, kind: NotificationKind) -> Notification {
        let n = Notification {
            id: NotificationId::new(),
            owner_id: owner,
            kind,
            title: "heads up".into(),
            body: None,
            is_read: false,
            read_at: None,
            created_at: now(),
        };
        db.insert_notification(&n).unwrap();
        n
    }

    #[test]
    fn system_rows_must_be_ownerless() {
        let db = Database::open_in_memory().unwrap();
        let bad = Notification {
            id: NotificationId::new(),
            owner_id: Some(UserId::new()),
            kind: NotificationKind::System,
            title: "x".into(),
            body: None,
            is_read: false,
            read_at: None,
            created_at: now(),
        };
        assert!(db.insert_notification(&bad).is_err());
    }

    #[test]
    fn listing_respects_scope() {
        let db = Database::open_in_memory().unwrap();
        let curator = UserId::new();
        let regular = UserId::new();
        let system = notify(&db, None, NotificationKind::System);
        notify(&db, Some(regular), NotificationKind::Message);
        notify(&db, Some(curator), NotificationKind::General);

        let curated = db
            .list_notifications(NotificationScope::Curator(curator), 50, 0)
            .unwrap();
        assert_eq!(curated.len(), 2);
        assert!(curated.iter().any(|n| n.id == system.id));

        let personal = db
            .list_notifications(NotificationScope::Personal(regular), 50, 0)
            .unwrap();
        assert_eq!(personal.len(), 1);
        assert_eq!(personal[0].owner_id, Some(regular));
    }

    #[test]
    fn listing_pages_with_offset() {
        let db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let scope = NotificationScope::Personal(owner);
        for _ in 0..3 {
            notify(&db, Some(owner), NotificationKind::General);
        }

        let pages: Vec<NotificationId> = (0..3)
            .map(|offset| {
                let page = db.list_notifications(scope, 1, offset).unwrap();
                assert_eq!(page.len(), 1);
                page[0].id
            })
            .collect();
        assert_ne!(pages[0], pages[1]);
        assert_ne!(pages[1], pages[2]);
        assert_ne!(pages[0], pages[2]);
        assert!(db.list_notifications(scope, 1, 3).unwrap().is_empty());

        let all: Vec<NotificationId> = db
            .all_notifications(scope)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(all, pages);
    }

    #[test]
    fn unbounded_listing_exceeds_page_size() {
        let db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        for _ in 0..120 {
            notify(&db, Some(owner), NotificationKind::General);
        }
        let all = db.all_notifications(NotificationScope::Personal(owner)).unwrap();
        assert_eq!(all.len(), 120);
    }

    #[test]
    fn personal_mark_all_never_touches_system_rows() {
        let db = Database::open_in_memory().unwrap();
        let regular = UserId::new();
        let system = notify(&db, None, NotificationKind::System);
        notify(&db, Some(regular), NotificationKind::Group);

        let changed = db
            .mark_all_notifications_read(NotificationScope::Personal(regular), now())
            .unwrap();
        assert_eq!(changed, 1);
        assert!(!db.get_notification(system.id).unwrap().is_read);

        let curator = UserId::new();
        let changed = db
            .mark_all_notifications_read(NotificationScope::Curator(curator), now())
            .unwrap();
        assert_eq!(changed, 1);
        assert!(db.get_notification(system.id).unwrap().is_read);
    }

    #[test]
    fn single_mark_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let n = notify(&db, Some(UserId::new()), NotificationKind::General);
        assert!(db.mark_notification_read(n.id, now()).unwrap());
        assert!(!db.mark_notification_read(n.id, now()).unwrap());
    }
}
