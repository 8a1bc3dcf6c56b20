use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Personal and system-wide notifications
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id   TEXT,                        -- NULL for system-wide
    kind       TEXT NOT NULL,
    title      TEXT NOT NULL,
    body       TEXT,
    is_read    INTEGER NOT NULL DEFAULT 0,
    read_at    TEXT,
    created_at TEXT NOT NULL,

    CHECK ((kind = 'SYSTEM') = (owner_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_notifications_owner ON notifications(owner_id, is_read);
CREATE INDEX IF NOT EXISTS idx_notifications_kind ON notifications(kind, is_read);

-- Shared contact-request inbox
CREATE TABLE IF NOT EXISTS contact_requests (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name       TEXT NOT NULL,
    email      TEXT NOT NULL,
    message    TEXT NOT NULL,
    is_read    INTEGER NOT NULL DEFAULT 0,
    read_at    TEXT,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_contact_requests_unread ON contact_requests(deleted_at, is_read);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
