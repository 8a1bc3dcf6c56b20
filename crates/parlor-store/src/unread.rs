//! Unread counters.
//!
//! Counters are never stored; every call recounts from the source rows.

use parlor_shared::UserId;
use rusqlite::params;

use crate::convert::count;
use crate::database::Database;
use crate::error::Result;
use crate::models::NotificationScope;

impl Database {
    /// Live direct messages addressed to `user_id` that are still unread.
    pub fn count_unread_direct(&self, user_id: UserId) -> Result<u64> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE recipient_id = ?1 AND is_read = 0 AND deleted_at IS NULL",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count(n))
    }

    /// Live messages in the user's live, active groups, written by someone
    /// else and without a receipt from the user.
    pub fn count_unread_group(&self, user_id: UserId) -> Result<u64> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages m
             JOIN group_members gm
               ON gm.group_id = m.group_id AND gm.user_id = ?1 AND gm.left_at IS NULL
             JOIN groups g ON g.id = m.group_id AND g.deleted_at IS NULL
             WHERE m.sender_id <> ?1
               AND m.deleted_at IS NULL
               AND NOT EXISTS (
                   SELECT 1 FROM message_reads r
                   WHERE r.message_id = m.id AND r.reader_id = ?1
               )",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count(n))
    }

    pub fn count_unread_messages(&self, user_id: UserId) -> Result<u64> {
        Ok(self.count_unread_direct(user_id)? + self.count_unread_group(user_id)?)
    }

    pub fn count_unread_notifications(&self, scope: NotificationScope) -> Result<u64> {
        let n: i64 = self.conn().query_row(
            &format!(
                "SELECT COUNT(*) FROM notifications WHERE is_read = 0 AND {}",
                scope.sql_filter()
            ),
            params![scope.viewer().to_string()],
            |row| row.get(0),
        )?;
        Ok(count(n))
    }

    /// The contact inbox is shared, so this count is the same for everyone.
    pub fn count_unread_contact_requests(&self) -> Result<u64> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM contact_requests WHERE is_read = 0 AND deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact_requests::tests::submit;
    use crate::convert::now;
    use crate::groups::tests::seed_group;
    use crate::models::{Message, NotificationKind};
    use crate::notifications::tests::notify;
    use parlor_shared::ConversationTarget;

    #[test]
    fn group_message_counts_for_other_active_members_only() {
        let mut db = Database::open_in_memory().unwrap();
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();
        let d = UserId::new();
        let group = seed_group(&mut db, a, &[b, c, d]);
        db.mark_member_left(group.id, d, now()).unwrap();

        let msg = Message::new(a, ConversationTarget::Group(group.id), "hello".into(), None, now());
        db.insert_message(&msg).unwrap();

        assert_eq!(db.count_unread_messages(a).unwrap(), 0);
        assert_eq!(db.count_unread_messages(b).unwrap(), 1);
        assert_eq!(db.count_unread_messages(c).unwrap(), 1);
        assert_eq!(db.count_unread_messages(d).unwrap(), 0);

        db.record_message_read(msg.id, b, now()).unwrap();
        assert_eq!(db.count_unread_messages(b).unwrap(), 0);
    }

    #[test]
    fn deleted_groups_and_messages_do_not_count() {
        let mut db = Database::open_in_memory().unwrap();
        let a = UserId::new();
        let b = UserId::new();
        let group = seed_group(&mut db, a, &[b]);
        let msg = Message::new(a, ConversationTarget::Group(group.id), "x".into(), None, now());
        db.insert_message(&msg).unwrap();
        assert_eq!(db.count_unread_group(b).unwrap(), 1);

        db.soft_delete_group(group.id, now()).unwrap();
        assert_eq!(db.count_unread_group(b).unwrap(), 0);
        db.restore_group(group.id, now()).unwrap();
        assert_eq!(db.count_unread_group(b).unwrap(), 1);

        db.soft_delete_message(msg.id, now()).unwrap();
        assert_eq!(db.count_unread_group(b).unwrap(), 0);
    }

    #[test]
    fn direct_unread_follows_read_flag() {
        let db = Database::open_in_memory().unwrap();
        let a = UserId::new();
        let b = UserId::new();
        let msg = Message::new(a, ConversationTarget::Direct(b), "x".into(), None, now());
        db.insert_message(&msg).unwrap();

        assert_eq!(db.count_unread_direct(b).unwrap(), 1);
        assert_eq!(db.count_unread_direct(a).unwrap(), 0);
        db.mark_direct_read(msg.id, now()).unwrap();
        assert_eq!(db.count_unread_direct(b).unwrap(), 0);
    }

    #[test]
    fn system_notifications_count_only_for_curator() {
        let db = Database::open_in_memory().unwrap();
        let curator = UserId::new();
        let regular = UserId::new();
        notify(&db, None, NotificationKind::System);
        notify(&db, Some(regular), NotificationKind::Message);

        assert_eq!(
            db.count_unread_notifications(NotificationScope::Curator(curator))
                .unwrap(),
            1
        );
        assert_eq!(
            db.count_unread_notifications(NotificationScope::Personal(regular))
                .unwrap(),
            1
        );
        assert_eq!(
            db.count_unread_notifications(NotificationScope::Personal(UserId::new()))
                .unwrap(),
            0
        );
    }

    #[test]
    fn contact_requests_are_a_global_count() {
        let db = Database::open_in_memory().unwrap();
        let read = submit(&db);
        let deleted = submit(&db);
        submit(&db);
        db.mark_contact_request_read(read.id, now()).unwrap();
        db.soft_delete_contact_request(deleted.id, now()).unwrap();
        assert_eq!(db.count_unread_contact_requests().unwrap(), 1);
    }
}
