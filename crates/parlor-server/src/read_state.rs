//! Read state for direct and group messages.
//!
//! A direct message has exactly one possible reader and stores a boolean
//! flag on the message row. A group message has many readers and stores one
//! receipt row per reader. [`ReadTracker`] hides the difference from the
//! rest of the server.

use chrono::{DateTime, Utc};
use parlor_shared::{GroupId, MessageId, Principal, UserId};
use parlor_store::{Database, Message, MessageKind};
use serde::Serialize;

use crate::error::ServerError;
use crate::guard::{self, GroupAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTracker {
    /// Direct message: read once the recipient flips the flag.
    BooleanFlag { recipient_id: UserId },
    /// Group message: read by whoever holds a receipt.
    ReaderSet { group_id: GroupId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOutcome {
    /// The reader wrote the message; nothing to record.
    Authored,
    AlreadyRead,
    Marked,
}

/// Result of a mark-read call.
#[derive(Debug, Clone, Serialize)]
pub struct ReadReceipt {
    pub message_id: MessageId,
    pub reader_id: UserId,
    pub outcome: ReadOutcome,
    /// When the reader first read the message, if known.
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub message: Message,
}

impl ReadReceipt {
    /// Whether this call changed stored state.
    pub fn changed(&self) -> bool {
        self.outcome == ReadOutcome::Marked
    }
}

impl ReadTracker {
    pub fn for_message(message: &Message) -> Self {
        match &message.kind {
            MessageKind::Direct { recipient_id, .. } => ReadTracker::BooleanFlag {
                recipient_id: *recipient_id,
            },
            MessageKind::Group { group_id } => ReadTracker::ReaderSet {
                group_id: *group_id,
            },
        }
    }

    /// Check that `reader` is allowed to hold read state on this message.
    fn authorize(&self, db: &Database, reader: &Principal) -> Result<(), ServerError> {
        match self {
            ReadTracker::BooleanFlag { recipient_id } => {
                if *recipient_id != reader.id {
                    return Err(ServerError::forbidden("Only the recipient can mark this message read"));
                }
            }
            ReadTracker::ReaderSet { group_id } => {
                let group = db.get_group(*group_id)?;
                let member = db.get_member(*group_id, reader.id)?;
                guard::authorize(reader, &group, member.as_ref(), GroupAction::MarkRead)?;
            }
        }
        Ok(())
    }

    /// Whether `user` has read `message`. Authors always have.
    pub fn is_read_by(&self, db: &Database, message: &Message, user: UserId) -> Result<bool, ServerError> {
        if message.sender_id == user {
            return Ok(true);
        }
        match (self, &message.kind) {
            (ReadTracker::BooleanFlag { recipient_id }, MessageKind::Direct { is_read, .. }) => {
                Ok(*recipient_id == user && *is_read)
            }
            (ReadTracker::ReaderSet { .. }, _) => {
                Ok(db.get_message_read(message.id, user)?.is_some())
            }
            (ReadTracker::BooleanFlag { .. }, _) => Ok(false),
        }
    }

    /// Record that `reader` has read `message`. Repeating the call is a
    /// no-op that reports [`ReadOutcome::AlreadyRead`].
    pub fn mark_read(
        &self,
        db: &Database,
        message: &Message,
        reader: &Principal,
        at: DateTime<Utc>,
    ) -> Result<(ReadOutcome, Option<DateTime<Utc>>), ServerError> {
        if message.sender_id == reader.id {
            return Ok((ReadOutcome::Authored, None));
        }
        self.authorize(db, reader)?;

        match self {
            ReadTracker::BooleanFlag { .. } => {
                if db.mark_direct_read(message.id, at)? {
                    Ok((ReadOutcome::Marked, Some(at)))
                } else {
                    let read_at = match db.get_message(message.id)?.kind {
                        MessageKind::Direct { read_at, .. } => read_at,
                        MessageKind::Group { .. } => None,
                    };
                    Ok((ReadOutcome::AlreadyRead, read_at))
                }
            }
            ReadTracker::ReaderSet { .. } => {
                if db.record_message_read(message.id, reader.id, at)? {
                    Ok((ReadOutcome::Marked, Some(at)))
                } else {
                    let read_at = db.get_message_read(message.id, reader.id)?.map(|r| r.read_at);
                    Ok((ReadOutcome::AlreadyRead, read_at))
                }
            }
        }
    }
}

/// A message that exists and is not soft-deleted.
pub fn live_message(db: &Database, id: MessageId) -> Result<Message, ServerError> {
    match db.get_message(id) {
        Ok(message) if !message.is_deleted() => Ok(message),
        Ok(_) | Err(parlor_store::StoreError::NotFound) => {
            Err(ServerError::not_found("Message not found"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Load a message and mark it read by `reader`.
pub fn mark_message_read(
    db: &Database,
    message_id: MessageId,
    reader: &Principal,
    at: DateTime<Utc>,
) -> Result<ReadReceipt, ServerError> {
    let message = live_message(db, message_id)?;
    let (outcome, read_at) = ReadTracker::for_message(&message).mark_read(db, &message, reader, at)?;

    Ok(ReadReceipt {
        message_id,
        reader_id: reader.id,
        outcome,
        read_at,
        message,
    })
}
