use chrono::{DateTime, Utc};
use parlor_shared::{ConversationTarget, GroupId, MessageId, UserId};
use rusqlite::params;

use crate::convert::{get_id, get_opt_id, get_opt_ts, get_ts, opt_ts, ts};
use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{Message, MessageKind};

const MESSAGE_COLUMNS: &str =
    "id, sender_id, recipient_id, group_id, content, parent_id, is_read, read_at, created_at, deleted_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let (recipient_id, group_id, is_read, read_at) = match &message.kind {
            MessageKind::Direct {
                recipient_id,
                is_read,
                read_at,
            } => (Some(recipient_id.to_string()), None, *is_read, opt_ts(read_at)),
            MessageKind::Group { group_id } => (None, Some(group_id.to_string()), false, None),
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender_id, recipient_id, group_id, content, parent_id,
                                   is_read, read_at, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.id.to_string(),
                message.sender_id.to_string(),
                recipient_id,
                group_id,
                message.content,
                message.parent_id.map(|p| p.to_string()),
                is_read,
                read_at,
                ts(&message.created_at),
                opt_ts(&message.deleted_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch a message regardless of its soft-delete state.
    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(not_found)
    }

    /// Non-deleted messages of a group, newest first.
    pub fn list_group_messages(
        &self,
        group_id: GroupId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE group_id = ?1 AND deleted_at IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![group_id.to_string(), limit, offset], row_to_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Non-deleted direct messages exchanged between `a` and `b` in either
    /// direction, newest first.
    pub fn list_direct_thread(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE deleted_at IS NULL
               AND ((sender_id = ?1 AND recipient_id = ?2)
                 OR (sender_id = ?2 AND recipient_id = ?1))
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4"
        ))?;

        let rows = stmt.query_map(
            params![a.to_string(), b.to_string(), limit, offset],
            row_to_message,
        )?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Flip the read flag of a direct message. Returns `false` when the
    /// message was already read, leaving the original `read_at` intact.
    pub fn mark_direct_read(&self, id: MessageId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1, read_at = ?2
             WHERE id = ?1 AND recipient_id IS NOT NULL AND is_read = 0",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    /// Mark every unread, non-deleted direct message from `sender_id` to
    /// `recipient_id` as read. Returns the number of messages flipped.
    pub fn mark_direct_thread_read(
        &self,
        recipient_id: UserId,
        sender_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1, read_at = ?3
             WHERE recipient_id = ?1 AND sender_id = ?2
               AND is_read = 0 AND deleted_at IS NULL",
            params![recipient_id.to_string(), sender_id.to_string(), ts(&at)],
        )?;
        Ok(affected)
    }

    /// Returns `false` if the message was already soft-deleted.
    pub fn soft_delete_message(&self, id: MessageId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    /// Remove a message row for good; its read receipts cascade.
    pub fn hard_delete_message(&self, id: MessageId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM messages WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let recipient_id: Option<UserId> = get_opt_id(row, 2)?;
    let group_id: Option<GroupId> = get_opt_id(row, 3)?;

    // The table CHECK guarantees exactly one side is set.
    let kind = match ConversationTarget::from_parts(recipient_id, group_id) {
        Ok(ConversationTarget::Direct(recipient_id)) => MessageKind::Direct {
            recipient_id,
            is_read: row.get(6)?,
            read_at: get_opt_ts(row, 7)?,
        },
        Ok(ConversationTarget::Group(group_id)) => MessageKind::Group { group_id },
        Err(e) => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        }
    };

    Ok(Message {
        id: get_id(row, 0)?,
        sender_id: get_id(row, 1)?,
        kind,
        content: row.get(4)?,
        parent_id: get_opt_id(row, 5)?,
        created_at: get_ts(row, 8)?,
        deleted_at: get_opt_ts(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::now;
    use crate::groups::tests::seed_group;
    use crate::StoreError;

    fn direct(db: &Database, from: UserId, to: UserId, text: &str) -> Message {
        let msg = Message::new(from, ConversationTarget::Direct(to), text.into(), None, now());
        db.insert_message(&msg).unwrap();
        msg
    }

    #[test]
    fn insert_and_get_direct_message() {
        let db = Database::open_in_memory().unwrap();
        let msg = direct(&db, UserId::new(), UserId::new(), "hi");
        assert_eq!(db.get_message(msg.id).unwrap(), msg);
    }

    #[test]
    fn insert_and_get_group_message() {
        let mut db = Database::open_in_memory().unwrap();
        let admin = UserId::new();
        let group = seed_group(&mut db, admin, &[]);
        let msg = Message::new(admin, ConversationTarget::Group(group.id), "yo".into(), None, now());
        db.insert_message(&msg).unwrap();

        let loaded = db.get_message(msg.id).unwrap();
        assert_eq!(loaded.group_id(), Some(group.id));
        assert_eq!(loaded.recipient_id(), None);
    }

    #[test]
    fn schema_rejects_both_targets() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn().execute(
            "INSERT INTO messages (id, sender_id, recipient_id, group_id, content, created_at)
             VALUES ('m', 's', 'r', 'g', 'x', '2024-01-01T00:00:00.000000Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn direct_read_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let msg = direct(&db, UserId::new(), UserId::new(), "hi");

        let first = now();
        assert!(db.mark_direct_read(msg.id, first).unwrap());
        let later = first + chrono::Duration::seconds(5);
        assert!(!db.mark_direct_read(msg.id, later).unwrap());

        match db.get_message(msg.id).unwrap().kind {
            MessageKind::Direct { is_read, read_at, .. } => {
                assert!(is_read);
                assert_eq!(read_at, Some(first));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn thread_lists_both_directions_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = UserId::new();
        let b = UserId::new();
        let first = direct(&db, a, b, "one");
        let mut second = Message::new(b, ConversationTarget::Direct(a), "two".into(), None, now());
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        db.insert_message(&second).unwrap();
        direct(&db, a, UserId::new(), "elsewhere");

        let thread = db.list_direct_thread(a, b, 50, 0).unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].id, second.id);
        assert_eq!(thread[1].id, first.id);
    }

    #[test]
    fn bulk_thread_read_only_touches_incoming() {
        let db = Database::open_in_memory().unwrap();
        let a = UserId::new();
        let b = UserId::new();
        direct(&db, b, a, "1");
        direct(&db, b, a, "2");
        let outgoing = direct(&db, a, b, "3");

        assert_eq!(db.mark_direct_thread_read(a, b, now()).unwrap(), 2);
        assert_eq!(db.mark_direct_thread_read(a, b, now()).unwrap(), 0);
        assert!(matches!(
            db.get_message(outgoing.id).unwrap().kind,
            MessageKind::Direct { is_read: false, .. }
        ));
    }

    #[test]
    fn soft_deleted_messages_leave_listings() {
        let mut db = Database::open_in_memory().unwrap();
        let admin = UserId::new();
        let group = seed_group(&mut db, admin, &[]);
        let msg = Message::new(admin, ConversationTarget::Group(group.id), "x".into(), None, now());
        db.insert_message(&msg).unwrap();

        assert!(db.soft_delete_message(msg.id, now()).unwrap());
        assert!(!db.soft_delete_message(msg.id, now()).unwrap());
        assert!(db.list_group_messages(group.id, 50, 0).unwrap().is_empty());
        assert!(db.get_message(msg.id).unwrap().is_deleted());

        assert!(db.hard_delete_message(msg.id).unwrap());
        assert!(matches!(db.get_message(msg.id), Err(StoreError::NotFound)));
    }
}
