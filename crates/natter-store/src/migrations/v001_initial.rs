//! v001 -- Initial schema creation.
//!
//! Creates `users`, `contacts` and `pending_contacts`. Uniqueness of a
//! contact pair and of a pending request pair is enforced here, not by the
//! callers' lookup-then-insert sequences.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL COLLATE NOCASE,
    email           TEXT NOT NULL,
    password_hash   TEXT NOT NULL,               -- argon2 PHC string
    display_name    TEXT,
    status          INTEGER NOT NULL DEFAULT 0,  -- 0 offline, 1 online, 2-3 custom
    status_text     TEXT,
    image_url       TEXT,
    validation_guid TEXT NOT NULL,
    created_at      TEXT NOT NULL                -- RFC-3339
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username);

-- ----------------------------------------------------------------
-- Confirmed contacts (one row per direction)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    contact_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (contact_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_pair ON contacts(user_id, contact_id);

-- ----------------------------------------------------------------
-- Pending contact requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS pending_contacts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id INTEGER NOT NULL,
    target_id    INTEGER NOT NULL,
    message      TEXT,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (requester_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_pair
    ON pending_contacts(requester_id, target_id);
CREATE INDEX IF NOT EXISTS idx_pending_target ON pending_contacts(target_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
