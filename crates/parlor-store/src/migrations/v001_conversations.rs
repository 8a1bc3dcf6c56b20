//! v001 -- Conversation schema.
//!
//! Creates `groups`, `group_members`, `messages`, and `message_reads`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id          TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name        TEXT NOT NULL,
    description TEXT,
    avatar      TEXT,
    creator_id  TEXT NOT NULL,
    created_at  TEXT NOT NULL,               -- RFC-3339, microseconds, UTC
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT                         -- soft-delete marker
);

-- ----------------------------------------------------------------
-- Group members
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_members (
    group_id  TEXT NOT NULL,
    user_id   TEXT NOT NULL,
    role      TEXT NOT NULL CHECK (role IN ('ADMIN', 'MEMBER')),
    joined_at TEXT NOT NULL,
    left_at   TEXT,                          -- non-null: no longer active

    PRIMARY KEY (group_id, user_id),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    sender_id    TEXT NOT NULL,
    recipient_id TEXT,                       -- direct messages only
    group_id     TEXT,                       -- group messages only
    content      TEXT NOT NULL,
    parent_id    TEXT,                       -- reply threading
    is_read      INTEGER NOT NULL DEFAULT 0, -- direct messages only
    read_at      TEXT,
    created_at   TEXT NOT NULL,
    deleted_at   TEXT,

    CHECK ((recipient_id IS NULL) <> (group_id IS NULL)),
    CHECK (group_id IS NULL OR (is_read = 0 AND read_at IS NULL)),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
    FOREIGN KEY (parent_id) REFERENCES messages(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_group_ts
    ON messages(group_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_recipient_unread
    ON messages(recipient_id, is_read);
CREATE INDEX IF NOT EXISTS idx_messages_pair_ts
    ON messages(sender_id, recipient_id, created_at DESC);

-- ----------------------------------------------------------------
-- Group message read receipts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS message_reads (
    message_id TEXT NOT NULL,
    reader_id  TEXT NOT NULL,
    read_at    TEXT NOT NULL,

    PRIMARY KEY (message_id, reader_id),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_message_reads_reader ON message_reads(reader_id);
"#;

/// Apply the conversation migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
