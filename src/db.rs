use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::config::DEFAULT_BUSY_TIMEOUT_MS;

pub const DB_FILE_NAME: &str = "ngaji.sqlite3";

pub fn open_db(workspace: &Path, busy_timeout: Duration) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE_NAME))?;
    conn.busy_timeout(busy_timeout)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Fresh private database, used by unit tests and tooling.
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            teacher_id TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('student', 'teacher', 'parent', 'admin')),
            group_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(group_id) REFERENCES groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_group_role ON users(group_id, role)",
        [],
    )?;

    // Row-level invariants are duplicated here so a buggy writer cannot
    // persist points on a non-accepted submission or review data on a pending one.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('memorization', 'review')),
            surah TEXT NOT NULL,
            juz INTEGER NOT NULL CHECK(juz BETWEEN 1 AND 30),
            verse_start INTEGER,
            verse_end INTEGER,
            media_uri TEXT NOT NULL CHECK(length(media_uri) > 0),
            submitted_on TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'accepted', 'rejected')),
            review_note TEXT,
            points_awarded INTEGER NOT NULL DEFAULT 0,
            reviewer_id TEXT,
            reviewed_at TEXT,
            created_at TEXT NOT NULL,
            CHECK((status = 'accepted' AND points_awarded > 0)
               OR (status <> 'accepted' AND points_awarded = 0)),
            CHECK(status <> 'pending' OR (review_note IS NULL AND reviewer_id IS NULL)),
            FOREIGN KEY(student_id) REFERENCES users(id),
            FOREIGN KEY(group_id) REFERENCES groups(id)
        )",
        [],
    )?;
    ensure_submissions_reviewed_at(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_queue
         ON submissions(group_id, status, submitted_on)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_ledgers(
            student_id TEXT PRIMARY KEY,
            total_points INTEGER NOT NULL DEFAULT 0 CHECK(total_points >= 0),
            memorization_points INTEGER NOT NULL DEFAULT 0 CHECK(memorization_points >= 0),
            quiz_points INTEGER NOT NULL DEFAULT 0 CHECK(quiz_points >= 0),
            updated_at TEXT NOT NULL,
            CHECK(total_points = memorization_points + quiz_points),
            FOREIGN KEY(student_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entries(
            id TEXT PRIMARY KEY,
            source_key TEXT UNIQUE,
            student_id TEXT NOT NULL,
            bucket TEXT NOT NULL CHECK(bucket IN ('memorization', 'quiz')),
            amount INTEGER NOT NULL CHECK(amount >= 0),
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_entries_student ON ledger_entries(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS labels(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            juz INTEGER NOT NULL CHECK(juz BETWEEN 1 AND 30),
            issuer_id TEXT NOT NULL,
            note TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id),
            UNIQUE(student_id, juz)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

// Workspaces created before review timestamps were tracked lack this column.
fn ensure_submissions_reviewed_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "submissions", "reviewed_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE submissions ADD COLUMN reviewed_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Wraps a domain parse failure so it can be returned from a row-mapping closure.
pub(crate) fn column_err(idx: usize, e: crate::error::NgajiError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Runs `f` inside a named savepoint. Works both inside and outside an open
/// transaction, so ledger helpers compose with the review transaction.
pub(crate) fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> crate::error::Result<T>,
) -> crate::error::Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(v) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(v)
        }
        Err(e) => {
            let _ = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"));
            Err(e)
        }
    }
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
