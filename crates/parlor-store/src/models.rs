//! Domain model structs persisted in the relational store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer and the socket fanout.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parlor_shared::{
    ContactRequestId, ConversationTarget, GroupId, GroupRole, MessageId, NotificationId, UserId,
    ValidationError,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named conversation container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    /// Avatar URL or blob key.
    pub avatar: Option<String>,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while the group is soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Group {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// GroupMember
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
    /// A member with `left_at` set is gone for good: no fanout, no rights.
    pub left_at: Option<DateTime<Utc>>,
}

impl GroupMember {
    pub fn new(group_id: GroupId, user_id: UserId, role: GroupRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            group_id,
            user_id,
            role,
            joined_at,
            left_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }

    pub fn is_active_admin(&self) -> bool {
        self.is_active() && self.role == GroupRole::Admin
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Direct vs. group message. Read tracking differs between the two: a direct
/// message has a single reader and carries a boolean flag, a group message
/// tracks its readers in `message_reads`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageKind {
    Direct {
        recipient_id: UserId,
        is_read: bool,
        read_at: Option<DateTime<Utc>>,
    },
    Group {
        group_id: GroupId,
    },
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(flatten)]
    pub kind: MessageKind,
    pub content: String,
    /// Message this one replies to.
    pub parent_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// A fresh, unread message for `target`.
    pub fn new(
        sender_id: UserId,
        target: ConversationTarget,
        content: String,
        parent_id: Option<MessageId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let kind = match target {
            ConversationTarget::Direct(recipient_id) => MessageKind::Direct {
                recipient_id,
                is_read: false,
                read_at: None,
            },
            ConversationTarget::Group(group_id) => MessageKind::Group { group_id },
        };

        Self {
            id: MessageId::new(),
            sender_id,
            kind,
            content,
            parent_id,
            created_at,
            deleted_at: None,
        }
    }

    pub fn target(&self) -> ConversationTarget {
        match &self.kind {
            MessageKind::Direct { recipient_id, .. } => ConversationTarget::Direct(*recipient_id),
            MessageKind::Group { group_id } => ConversationTarget::Group(*group_id),
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.target().group_id()
    }

    pub fn recipient_id(&self) -> Option<UserId> {
        self.target().recipient_id()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether `other` lives in the same conversation (same group, or the
    /// same unordered pair of direct participants).
    pub fn same_conversation(&self, sender_id: UserId, target: &ConversationTarget) -> bool {
        match (&self.target(), target) {
            (ConversationTarget::Group(a), ConversationTarget::Group(b)) => a == b,
            (ConversationTarget::Direct(r), ConversationTarget::Direct(other_r)) => {
                (self.sender_id == sender_id && r == other_r)
                    || (self.sender_id == *other_r && *r == sender_id)
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageRead
// ---------------------------------------------------------------------------

/// A member has read a group message. At most one per (message, reader).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRead {
    pub message_id: MessageId,
    pub reader_id: UserId,
    pub read_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// System-wide broadcast; has no owner.
    System,
    Message,
    Group,
    ContactRequest,
    General,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::System => "SYSTEM",
            NotificationKind::Message => "MESSAGE",
            NotificationKind::Group => "GROUP",
            NotificationKind::ContactRequest => "CONTACT_REQUEST",
            NotificationKind::General => "GENERAL",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, NotificationKind::System)
    }
}

impl FromStr for NotificationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(NotificationKind::System),
            "MESSAGE" => Ok(NotificationKind::Message),
            "GROUP" => Ok(NotificationKind::Group),
            "CONTACT_REQUEST" => Ok(NotificationKind::ContactRequest),
            "GENERAL" => Ok(NotificationKind::General),
            other => Err(ValidationError::Invalid {
                field: "kind",
                reason: format!("unknown notification kind '{other}'"),
            }),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    /// `None` exactly when `kind` is [`NotificationKind::System`].
    pub owner_id: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Which notifications a viewer sees, and which ones their "mark all read"
/// touches.
///
/// The curator sees the shared system-wide notifications plus their own;
/// everyone else sees only their own personal notifications and can never
/// read or clear the shared system copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationScope {
    Curator(UserId),
    Personal(UserId),
}

impl NotificationScope {
    pub fn for_viewer(viewer: UserId, curator: Option<UserId>) -> Self {
        if curator == Some(viewer) {
            NotificationScope::Curator(viewer)
        } else {
            NotificationScope::Personal(viewer)
        }
    }

    pub fn viewer(&self) -> UserId {
        match self {
            NotificationScope::Curator(id) | NotificationScope::Personal(id) => *id,
        }
    }

    pub fn can_see(&self, notification: &Notification) -> bool {
        match self {
            NotificationScope::Curator(id) => {
                notification.kind.is_system() || notification.owner_id == Some(*id)
            }
            NotificationScope::Personal(id) => {
                !notification.kind.is_system() && notification.owner_id == Some(*id)
            }
        }
    }

    /// SQL predicate equivalent to [`Self::can_see`]; binds the viewer as `?1`.
    pub(crate) fn sql_filter(&self) -> &'static str {
        match self {
            NotificationScope::Curator(_) => "(kind = 'SYSTEM' OR owner_id = ?1)",
            NotificationScope::Personal(_) => "(owner_id = ?1 AND kind <> 'SYSTEM')",
        }
    }
}

// ---------------------------------------------------------------------------
// ContactRequest
// ---------------------------------------------------------------------------

/// An item in the shared contact-request inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactRequest {
    pub id: ContactRequestId,
    pub name: String,
    pub email: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
