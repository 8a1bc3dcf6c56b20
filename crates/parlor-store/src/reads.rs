//! Read receipts for group messages.
//!
//! A group message has many potential readers, so its read state is the set
//! of `message_reads` rows rather than a flag on the message.

use chrono::{DateTime, Utc};
use parlor_shared::{GroupId, MessageId, UserId};
use rusqlite::{params, OptionalExtension};

use crate::convert::{get_id, get_ts, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::MessageRead;

impl Database {
    /// Insert-if-absent. Returns `false` when the reader already had a
    /// receipt; the existing `read_at` is never overwritten.
    pub fn record_message_read(
        &self,
        message_id: MessageId,
        reader_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO message_reads (message_id, reader_id, read_at)
             VALUES (?1, ?2, ?3)",
            params![message_id.to_string(), reader_id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    pub fn get_message_read(
        &self,
        message_id: MessageId,
        reader_id: UserId,
    ) -> Result<Option<MessageRead>> {
        let read = self
            .conn()
            .query_row(
                "SELECT message_id, reader_id, read_at FROM message_reads
                 WHERE message_id = ?1 AND reader_id = ?2",
                params![message_id.to_string(), reader_id.to_string()],
                row_to_read,
            )
            .optional()?;
        Ok(read)
    }

    pub fn list_message_reads(&self, message_id: MessageId) -> Result<Vec<MessageRead>> {
        let mut stmt = self.conn().prepare(
            "SELECT message_id, reader_id, read_at FROM message_reads
             WHERE message_id = ?1
             ORDER BY read_at ASC",
        )?;

        let rows = stmt.query_map(params![message_id.to_string()], row_to_read)?;
        let mut reads = Vec::new();
        for row in rows {
            reads.push(row?);
        }
        Ok(reads)
    }

    /// Record a receipt for every live group message not written by
    /// `reader_id` that they have not read yet. Returns the number of new
    /// receipts.
    pub fn mark_group_read(
        &self,
        group_id: GroupId,
        reader_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO message_reads (message_id, reader_id, read_at)
             SELECT m.id, ?2, ?3 FROM messages m
             WHERE m.group_id = ?1
               AND m.sender_id <> ?2
               AND m.deleted_at IS NULL",
            params![group_id.to_string(), reader_id.to_string(), ts(&at)],
        )?;
        Ok(affected)
    }
}

fn row_to_read(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRead> {
    Ok(MessageRead {
        message_id: get_id(row, 0)?,
        reader_id: get_id(row, 1)?,
        read_at: get_ts(row, 2)?,
    })
}
