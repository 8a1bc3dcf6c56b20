//! Socket wire format.
//!
//! Server frames are JSON text `{"event": <name>, "data": {...}}`. Clients
//! may only send heartbeats and room re-join requests; every business
//! mutation goes through HTTP.

use chrono::{DateTime, Utc};
use parlor_shared::{ConversationTarget, GroupId, GroupRole, MessageId, Room, SessionId, UserId};
use parlor_store::{Group, GroupMember, Message, Notification};
use serde::{Deserialize, Serialize};

use crate::unread::UnreadCounters;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame after the handshake.
    Connected {
        session_id: SessionId,
        rooms: Vec<Room>,
        unread: UnreadCounters,
    },
    HeartbeatAck {
        at: DateTime<Utc>,
    },
    RoomsJoined {
        rooms: Vec<Room>,
    },

    // -- Messages --
    MessageSent {
        message: Message,
    },
    MessageRead {
        message_id: MessageId,
        target: ConversationTarget,
        reader_id: UserId,
        is_read: bool,
        read_at: Option<DateTime<Utc>>,
    },
    MessageDeleted {
        message_id: MessageId,
        target: ConversationTarget,
        permanent: bool,
    },
    /// Bulk read of a whole conversation by one reader.
    ConversationRead {
        target: ConversationTarget,
        reader_id: UserId,
        count: usize,
        read_at: DateTime<Utc>,
    },

    // -- Groups --
    GroupUpdated {
        group: Group,
    },
    GroupDeleted {
        group_id: GroupId,
    },
    GroupRestored {
        group: Group,
    },
    GroupHardDeleted {
        group_id: GroupId,
    },
    MemberAdded {
        group_id: GroupId,
        member: GroupMember,
    },
    MemberRemoved {
        group_id: GroupId,
        user_id: UserId,
        /// `true` when the member left on their own.
        voluntary: bool,
    },
    MemberRoleChanged {
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
    },

    // -- Notifications --
    NotificationCreated {
        notification: Notification,
    },
    /// Every notification in the viewer's tier after a bulk mark-read,
    /// unpaged. Not a delta.
    NotificationsRefreshed {
        notifications: Vec<Notification>,
    },

    UnreadCounts {
        counts: UnreadCounters,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::HeartbeatAck { .. } => "heartbeat_ack",
            ServerEvent::RoomsJoined { .. } => "rooms_joined",
            ServerEvent::MessageSent { .. } => "message_sent",
            ServerEvent::MessageRead { .. } => "message_read",
            ServerEvent::MessageDeleted { .. } => "message_deleted",
            ServerEvent::ConversationRead { .. } => "conversation_read",
            ServerEvent::GroupUpdated { .. } => "group_updated",
            ServerEvent::GroupDeleted { .. } => "group_deleted",
            ServerEvent::GroupRestored { .. } => "group_restored",
            ServerEvent::GroupHardDeleted { .. } => "group_hard_deleted",
            ServerEvent::MemberAdded { .. } => "member_added",
            ServerEvent::MemberRemoved { .. } => "member_removed",
            ServerEvent::MemberRoleChanged { .. } => "member_role_changed",
            ServerEvent::NotificationCreated { .. } => "notification_created",
            ServerEvent::NotificationsRefreshed { .. } => "notifications_refreshed",
            ServerEvent::UnreadCounts { .. } => "unread_counts",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Heartbeat,
    /// Re-join personal and group rooms, e.g. after a reconnect.
    JoinRooms,
}
