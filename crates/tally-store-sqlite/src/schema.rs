//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS classes (
    class_id         TEXT PRIMARY KEY,
    school_id        TEXT NOT NULL,
    class_label      TEXT NOT NULL,
    section_label    TEXT NOT NULL,
    class_teacher_id TEXT NOT NULL,
    UNIQUE (school_id, class_label, section_label)
);

CREATE TABLE IF NOT EXISTS students (
    student_id  TEXT PRIMARY KEY,
    class_id    TEXT NOT NULL REFERENCES classes(class_id),
    roll_number INTEGER NOT NULL,
    name        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exam_cycles (
    exam_cycle_id TEXT PRIMARY KEY,
    school_id     TEXT NOT NULL,
    label         TEXT NOT NULL,
    academic_year TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- Attendance is strictly append-only.
-- A correction is a new row for the same (student_id, date); latest wins.
CREATE TABLE IF NOT EXISTS attendance_records (
    record_id   TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL REFERENCES students(student_id),
    date        TEXT NOT NULL,   -- YYYY-MM-DD
    status      TEXT NOT NULL,   -- 'present' | 'absent'
    recorded_by TEXT NOT NULL,
    recorded_at TEXT NOT NULL    -- RFC 3339 UTC, fixed width; server-assigned
);

-- Only mutated through a compare-and-set on `version`, which every write bumps.
CREATE TABLE IF NOT EXISTS grade_submissions (
    submission_id      TEXT PRIMARY KEY,
    class_id           TEXT NOT NULL REFERENCES classes(class_id),
    subject            TEXT NOT NULL,
    exam_cycle_id      TEXT NOT NULL REFERENCES exam_cycles(exam_cycle_id),
    teacher_id         TEXT NOT NULL,
    entries_json       TEXT NOT NULL DEFAULT '{}',
    max_marks          REAL NOT NULL CHECK (max_marks > 0),
    status             TEXT NOT NULL,
    reviewer_comment   TEXT,
    created_at         TEXT NOT NULL,
    submitted_at       TEXT,
    last_transition_at TEXT NOT NULL,
    version            INTEGER NOT NULL DEFAULT 1,
    UNIQUE (class_id, subject, exam_cycle_id)
);

-- Every status change, append-only. from_status is NULL for creation.
CREATE TABLE IF NOT EXISTS submission_events (
    event_id      TEXT PRIMARY KEY,
    submission_id TEXT NOT NULL REFERENCES grade_submissions(submission_id),
    from_status   TEXT,
    to_status     TEXT NOT NULL,
    actor_id      TEXT NOT NULL,
    comment       TEXT,
    at            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS students_class_idx       ON students(class_id);
CREATE INDEX IF NOT EXISTS attendance_student_idx   ON attendance_records(student_id, date);
CREATE INDEX IF NOT EXISTS attendance_date_idx      ON attendance_records(date);
CREATE INDEX IF NOT EXISTS submissions_status_idx   ON grade_submissions(status);
CREATE INDEX IF NOT EXISTS events_submission_idx    ON submission_events(submission_id);

PRAGMA user_version = 1;
";
