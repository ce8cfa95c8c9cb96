//! SQL schema for the Inkwell SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,   -- normalised (trimmed, lowercase)
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_settings (
    user_id                TEXT PRIMARY KEY REFERENCES users(user_id),
    ai_system_instructions TEXT
);

CREATE TABLE IF NOT EXISTS documents (
    document_id            TEXT PRIMARY KEY,
    user_id                TEXT NOT NULL REFERENCES users(user_id),
    title                  TEXT NOT NULL,
    content                TEXT NOT NULL DEFAULT '',
    updated_at             TEXT NOT NULL,   -- ISO 8601 UTC
    ai_system_instructions TEXT
);

-- Children of documents. Deleted together with their document.
CREATE TABLE IF NOT EXISTS knowledge (
    knowledge_id TEXT PRIMARY KEY,
    document_id  TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    content      TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

-- Append-only apart from a per-document clear. Ordered by rowid.
CREATE TABLE IF NOT EXISTS messages (
    message_id  TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    role        TEXT NOT NULL,   -- 'user' | 'assistant'
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- At most one row per email. user_id is backfilled once and never replaced
-- by the reconciler.
CREATE TABLE IF NOT EXISTS subscriptions (
    subscription_id          TEXT PRIMARY KEY,
    user_id                  TEXT REFERENCES users(user_id),
    email                    TEXT NOT NULL UNIQUE,
    external_customer_id     TEXT,
    external_subscription_id TEXT,
    status                   TEXT NOT NULL,   -- 'active' | 'canceled' | 'past_due' | 'none'
    current_period_end       TEXT
);

CREATE INDEX IF NOT EXISTS documents_user_idx        ON documents(user_id);
CREATE INDEX IF NOT EXISTS knowledge_document_idx    ON knowledge(document_id);
CREATE INDEX IF NOT EXISTS messages_document_idx     ON messages(document_id);
CREATE INDEX IF NOT EXISTS subscriptions_user_idx    ON subscriptions(user_id);
CREATE INDEX IF NOT EXISTS subscriptions_external_idx ON subscriptions(external_subscription_id);

PRAGMA user_version = 1;
";
