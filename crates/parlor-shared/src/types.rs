use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{GROUP_ROOM_PREFIX, USER_ROOM_PREFIX};
use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identity of an authenticated user, as issued by the auth collaborator.
    UserId
);
uuid_id!(GroupId);
uuid_id!(MessageId);
uuid_id!(NotificationId);
uuid_id!(ContactRequestId);
uuid_id!(
    /// One live socket connection. A principal may hold several.
    SessionId
);

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The authenticated caller. Trusted as given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.push(permission.to_string());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

// ---------------------------------------------------------------------------
// Group role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "ADMIN",
            GroupRole::Member => "MEMBER",
        }
    }
}

impl FromStr for GroupRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(GroupRole::Admin),
            "MEMBER" => Ok(GroupRole::Member),
            other => Err(ValidationError::Invalid {
                field: "role",
                reason: format!("unknown role '{other}'"),
            }),
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Conversation target
// ---------------------------------------------------------------------------

/// Where a message goes. Exactly one of recipient or group, by construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConversationTarget {
    Direct(UserId),
    Group(GroupId),
}

impl ConversationTarget {
    /// Build a target from the two nullable columns/fields used on the wire.
    pub fn from_parts(
        recipient_id: Option<UserId>,
        group_id: Option<GroupId>,
    ) -> Result<Self, ValidationError> {
        match (recipient_id, group_id) {
            (Some(recipient), None) => Ok(Self::Direct(recipient)),
            (None, Some(group)) => Ok(Self::Group(group)),
            (Some(_), Some(_)) => Err(ValidationError::BothTargets),
            (None, None) => Err(ValidationError::NoTarget),
        }
    }

    pub fn recipient_id(&self) -> Option<UserId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Group(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Direct(_) => None,
            Self::Group(id) => Some(*id),
        }
    }
}

// ---------------------------------------------------------------------------
// Socket rooms
// ---------------------------------------------------------------------------

/// A socket room: `user:<id>` or `group:<id>`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub enum Room {
    User(UserId),
    Group(GroupId),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "{USER_ROOM_PREFIX}{id}"),
            Room::Group(id) => write!(f, "{GROUP_ROOM_PREFIX}{id}"),
        }
    }
}

impl FromStr for Room {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::Invalid {
            field: "room",
            reason: reason.to_string(),
        };

        if let Some(rest) = s.strip_prefix(USER_ROOM_PREFIX) {
            rest.parse()
                .map(Room::User)
                .map_err(|_| invalid("malformed user id"))
        } else if let Some(rest) = s.strip_prefix(GROUP_ROOM_PREFIX) {
            rest.parse()
                .map(Room::Group)
                .map_err(|_| invalid("malformed group id"))
        } else {
            Err(invalid("expected 'user:' or 'group:' prefix"))
        }
    }
}

impl From<Room> for String {
    fn from(room: Room) -> Self {
        room.to_string()
    }
}

impl TryFrom<String> for Room {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_exactly_one_side() {
        let user = UserId::new();
        let group = GroupId::new();

        assert_eq!(
            ConversationTarget::from_parts(Some(user), None),
            Ok(ConversationTarget::Direct(user))
        );
        assert_eq!(
            ConversationTarget::from_parts(None, Some(group)),
            Ok(ConversationTarget::Group(group))
        );
        assert_eq!(
            ConversationTarget::from_parts(Some(user), Some(group)),
            Err(ValidationError::BothTargets)
        );
        assert_eq!(
            ConversationTarget::from_parts(None, None),
            Err(ValidationError::NoTarget)
        );
    }

    #[test]
    fn test_room_display_and_parse() {
        let user = UserId::new();
        let room = Room::User(user);
        let text = room.to_string();
        assert!(text.starts_with("user:"));
        assert_eq!(text.parse::<Room>().unwrap(), room);

        let group = Room::Group(GroupId::new());
        assert_eq!(group.to_string().parse::<Room>().unwrap(), group);

        assert!("channel:abc".parse::<Room>().is_err());
        assert!("user:not-a-uuid".parse::<Room>().is_err());
    }

    #[test]
    fn test_room_serializes_as_string() {
        let room = Room::Group(GroupId::new());
        let json = serde_json::to_string(&room).unwrap();
        assert_eq!(json, format!("\"{room}\""));
        let back: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("ADMIN".parse::<GroupRole>().unwrap(), GroupRole::Admin);
        assert_eq!(GroupRole::Member.as_str(), "MEMBER");
        assert!("OWNER".parse::<GroupRole>().is_err());
        assert_eq!(serde_json::to_string(&GroupRole::Admin).unwrap(), "\"ADMIN\"");
    }

    #[test]
    fn test_principal_permissions() {
        let p = Principal::new(UserId::new()).with_permission("chat.manage");
        assert!(p.has_permission("chat.manage"));
        assert!(!p.has_permission("notifications.manage"));
    }
}
