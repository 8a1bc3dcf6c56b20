/// Application name
pub const APP_NAME: &str = "Parlor";

/// Global permission that grants group administration without membership
/// and permanent message deletion.
pub const PERMISSION_MANAGE_CHAT: &str = "chat.manage";

/// Permission to publish system-wide notifications and notifications on
/// behalf of other users.
pub const PERMISSION_MANAGE_NOTIFICATIONS: &str = "notifications.manage";

/// Permission to read and manage the shared contact-request inbox.
pub const PERMISSION_MANAGE_CONTACT_REQUESTS: &str = "contact_requests.manage";

/// Maximum message body length in characters
pub const MAX_MESSAGE_LEN: usize = 5_000;

/// Maximum group name length in characters
pub const MAX_GROUP_NAME_LEN: usize = 100;

/// Maximum group description length in characters
pub const MAX_GROUP_DESCRIPTION_LEN: usize = 1_000;

/// Maximum avatar reference (URL or blob key) length
pub const MAX_AVATAR_LEN: usize = 2_048;

/// Maximum notification title length in characters
pub const MAX_NOTIFICATION_TITLE_LEN: usize = 200;

/// Maximum contact-request sender name length in characters
pub const MAX_CONTACT_NAME_LEN: usize = 100;

/// Maximum notification / contact-request body length in characters
pub const MAX_NOTE_BODY_LEN: usize = 5_000;

/// Page size used when a listing request does not give one
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound for any listing page
pub const MAX_PAGE_SIZE: u32 = 100;

/// Room name prefix for a principal's personal channel
pub const USER_ROOM_PREFIX: &str = "user:";

/// Room name prefix for a group channel
pub const GROUP_ROOM_PREFIX: &str = "group:";
