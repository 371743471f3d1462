//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS resources (
    resource_id     TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,     -- 'book' | 'bus'
    details_json    TEXT NOT NULL,     -- JSON payload without the kind tag
    natural_key     TEXT,              -- ISBN for books, bus number for buses
    total_units     INTEGER NOT NULL,
    available_units INTEGER NOT NULL,
    created_at      TEXT NOT NULL,     -- ISO 8601 UTC; server-assigned
    UNIQUE (kind, natural_key),
    CHECK  (total_units >= 0),
    CHECK  (available_units BETWEEN 0 AND total_units)
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    roll_number TEXT UNIQUE,
    class_name  TEXT,
    created_at  TEXT NOT NULL
);

-- Rows are never deleted except through their resource.
-- The only UPDATE ever issued moves a row from 'open' to 'closed'.
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id TEXT PRIMARY KEY,
    resource_id   TEXT NOT NULL REFERENCES resources(resource_id) ON DELETE CASCADE,
    subject_id    TEXT NOT NULL REFERENCES subjects(subject_id),
    start_date    TEXT NOT NULL,   -- YYYY-MM-DD
    due_date      TEXT,            -- YYYY-MM-DD or NULL
    end_date      TEXT,            -- YYYY-MM-DD; NULL while open
    status        TEXT NOT NULL DEFAULT 'open',
    created_at    TEXT NOT NULL,
    CHECK (status IN ('open', 'closed')),
    CHECK ((status = 'open') = (end_date IS NULL))
);

-- At most one open assignment per (resource, subject).
CREATE UNIQUE INDEX IF NOT EXISTS assignments_one_open_idx
    ON assignments(resource_id, subject_id) WHERE status = 'open';

CREATE INDEX IF NOT EXISTS assignments_resource_idx ON assignments(resource_id, status);
CREATE INDEX IF NOT EXISTS assignments_subject_idx  ON assignments(subject_id, status);

PRAGMA user_version = 1;
";
