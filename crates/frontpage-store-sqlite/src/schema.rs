//! SQL schema for the Frontpage SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are never deleted. A delete event flips status to 'deleted'.
CREATE TABLE IF NOT EXISTS posts (
    id          INTEGER PRIMARY KEY,
    author_did  TEXT NOT NULL,
    rkey        TEXT NOT NULL,
    cid         TEXT NOT NULL,
    title       TEXT NOT NULL,
    url         TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- author-claimed, RFC 3339 UTC
    status      TEXT NOT NULL DEFAULT 'live' CHECK (status IN ('live', 'deleted')),
    UNIQUE (author_did, rkey)
);

CREATE TABLE IF NOT EXISTS comments (
    id          INTEGER PRIMARY KEY,
    post_id     INTEGER NOT NULL REFERENCES posts(id),
    author_did  TEXT NOT NULL,
    rkey        TEXT NOT NULL,
    cid         TEXT NOT NULL,
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'live' CHECK (status IN ('live', 'deleted')),
    UNIQUE (author_did, rkey)
);

CREATE TABLE IF NOT EXISTS votes (
    id          INTEGER PRIMARY KEY,
    post_id     INTEGER NOT NULL REFERENCES posts(id),
    author_did  TEXT NOT NULL,
    rkey        TEXT NOT NULL,
    cid         TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'live' CHECK (status IN ('live', 'deleted')),
    UNIQUE (author_did, rkey)
);

-- One live vote per author per post.
CREATE UNIQUE INDEX IF NOT EXISTS votes_one_live_per_author
    ON votes(post_id, author_did) WHERE status = 'live';

-- Idempotency ledger: one row per applied feed event.
CREATE TABLE IF NOT EXISTS consumed_offsets (
    event_offset INTEGER PRIMARY KEY,
    consumed_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS posts_author_idx    ON posts(author_did, status);
CREATE INDEX IF NOT EXISTS posts_status_idx    ON posts(status);
CREATE INDEX IF NOT EXISTS comments_post_idx   ON comments(post_id, status);
CREATE INDEX IF NOT EXISTS comments_author_idx ON comments(author_did, status);
CREATE INDEX IF NOT EXISTS votes_post_idx      ON votes(post_id, status);
CREATE INDEX IF NOT EXISTS votes_author_idx    ON votes(author_did, status);

PRAGMA user_version = 1;
";
