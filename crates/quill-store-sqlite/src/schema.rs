//! SQL schema for the Quill SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id    TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    password_hash TEXT,            -- argon2 PHC string; NULL for bridged accounts
    provider      TEXT,            -- identity-provider name, e.g. 'google'
    external_id   TEXT,            -- provider's subject identifier
    plan          TEXT NOT NULL DEFAULT 'Free',
    valid_until   TEXT,            -- ISO 8601 UTC; NULL for Free
    is_active     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    UNIQUE (provider, external_id)
);

-- Exactly one of author_id / guest_author is set (authorship invariant).
CREATE TABLE IF NOT EXISTS posts (
    post_id      TEXT PRIMARY KEY,
    slug         TEXT NOT NULL UNIQUE,
    author_id    TEXT REFERENCES accounts(account_id),
    guest_author TEXT,
    title        TEXT NOT NULL,
    body         TEXT NOT NULL,
    excerpt      TEXT NOT NULL,
    is_published INTEGER NOT NULL DEFAULT 0,
    tags         TEXT NOT NULL DEFAULT '[]',
    likes        TEXT NOT NULL DEFAULT '[]',
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    CHECK ((author_id IS NULL) != (guest_author IS NULL))
);

-- Payment records are never deleted; status only moves forward.
CREATE TABLE IF NOT EXISTS payments (
    payment_id   TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL UNIQUE,
    account_id   TEXT NOT NULL REFERENCES accounts(account_id),
    amount_cents INTEGER NOT NULL,
    currency     TEXT NOT NULL,
    plan         TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'created',
    payment_date TEXT,             -- stamped once, on transition to 'paid'
    valid_until  TEXT,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS posts_author_idx     ON posts(author_id);
CREATE INDEX IF NOT EXISTS posts_created_idx    ON posts(created_at);
CREATE INDEX IF NOT EXISTS payments_account_idx ON payments(account_id);

PRAGMA user_version = 1;
";
