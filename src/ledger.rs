//! Per-student point totals and juz-completion labels.
//!
//! Every credit is a single UPSERT increment at the store; nothing here
//! reads a total, adds in memory and writes it back.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{now_timestamp, with_savepoint};
use crate::error::{NgajiError, Result};
use crate::model::{validate_juz, validate_points, Label, PointBucket, RankEntry, StudentLedger, Totals};

pub fn submission_source_key(submission_id: &str) -> String {
    format!("submission:{submission_id}")
}

pub fn default_label_note(juz: i64) -> String {
    format!("Juz {juz} selesai - Hafalan diterima")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub credits_applied: u32,
    pub points_applied: i64,
    pub labels_issued: u32,
}

fn ledger_from_row(r: &Row<'_>) -> rusqlite::Result<StudentLedger> {
    Ok(StudentLedger {
        student_id: r.get(0)?,
        totals: Totals {
            total_points: r.get(1)?,
            memorization_points: r.get(2)?,
            quiz_points: r.get(3)?,
        },
        updated_at: r.get(4)?,
    })
}

fn label_from_row(r: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: r.get(0)?,
        student_id: r.get(1)?,
        juz: r.get(2)?,
        issuer_id: r.get(3)?,
        note: r.get(4)?,
        issued_at: r.get(5)?,
    })
}

fn ensure_student(conn: &Connection, student_id: &str) -> Result<()> {
    let role: Option<String> = conn
        .query_row("SELECT role FROM users WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    match role.as_deref() {
        Some("student") => Ok(()),
        Some(other) => Err(NgajiError::validation(format!(
            "user {} is a {}, not a student",
            student_id, other
        ))),
        None => Err(NgajiError::not_found(format!(
            "student {} not found",
            student_id
        ))),
    }
}

pub fn get(conn: &Connection, student_id: &str) -> Result<Option<StudentLedger>> {
    Ok(conn
        .query_row(
            "SELECT student_id, total_points, memorization_points, quiz_points, updated_at
             FROM student_ledgers WHERE student_id = ?",
            [student_id],
            ledger_from_row,
        )
        .optional()?)
}

pub fn get_or_create(conn: &Connection, student_id: &str) -> Result<StudentLedger> {
    ensure_student(conn, student_id)?;
    conn.execute(
        "INSERT INTO student_ledgers(student_id, updated_at) VALUES(?, ?)
         ON CONFLICT(student_id) DO NOTHING",
        (student_id, now_timestamp()),
    )?;
    get(conn, student_id)?
        .ok_or_else(|| NgajiError::Transport(format!("ledger for {} vanished", student_id)))
}

/// Credits `amount` to one bucket and to the total in one statement.
///
/// With a `source_key`, the credit is recorded in `ledger_entries` first and
/// a key that was already applied makes the call a no-op returning `false`.
/// That is what makes retries after a lost response safe.
pub fn add_points(
    conn: &Connection,
    student_id: &str,
    bucket: PointBucket,
    amount: i64,
    source_key: Option<&str>,
) -> Result<bool> {
    validate_points(amount)?;
    ensure_student(conn, student_id)?;

    with_savepoint(conn, "ledger_credit", || {
        let now = now_timestamp();
        let recorded = conn.execute(
            "INSERT INTO ledger_entries(id, source_key, student_id, bucket, amount, created_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_key) DO NOTHING",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                source_key,
                student_id,
                bucket.as_str(),
                amount,
                now,
            ],
        )?;
        if recorded == 0 {
            debug!(student_id, source_key, "credit already applied");
            return Ok(false);
        }

        let (memorization, quiz) = match bucket {
            PointBucket::Memorization => (amount, 0),
            PointBucket::Quiz => (0, amount),
        };
        // Buckets never exceed the total, so guarding the total keeps all
        // three columns inside INTEGER range.
        let credited = conn.execute(
            "INSERT INTO student_ledgers(student_id, total_points, memorization_points, quiz_points, updated_at)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(student_id) DO UPDATE SET
               total_points = total_points + excluded.total_points,
               memorization_points = memorization_points + excluded.memorization_points,
               quiz_points = quiz_points + excluded.quiz_points,
               updated_at = excluded.updated_at
             WHERE student_ledgers.total_points <= ? - excluded.total_points",
            rusqlite::params![student_id, amount, memorization, quiz, now, i64::MAX],
        )?;
        if credited == 0 {
            return Err(NgajiError::validation(format!(
                "ledger of {} cannot take {} more points",
                student_id, amount
            )));
        }
        Ok(true)
    })
}

/// Issues the label for `(student_id, juz)` unless one exists. Returns the
/// new label, or `None` when the student already holds it.
pub fn issue_label_if_absent(
    conn: &Connection,
    student_id: &str,
    juz: i64,
    issuer_id: &str,
    note: &str,
) -> Result<Option<Label>> {
    validate_juz(juz)?;
    ensure_student(conn, student_id)?;

    let label = Label {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        juz,
        issuer_id: issuer_id.to_string(),
        note: note.to_string(),
        issued_at: now_timestamp(),
    };
    let inserted = conn.execute(
        "INSERT INTO labels(id, student_id, juz, issuer_id, note, issued_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, juz) DO NOTHING",
        rusqlite::params![
            label.id,
            label.student_id,
            label.juz,
            label.issuer_id,
            label.note,
            label.issued_at,
        ],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    info!(student_id, juz, "label issued");
    Ok(Some(label))
}

pub fn labels_for(conn: &Connection, student_id: &str) -> Result<Vec<Label>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, juz, issuer_id, note, issued_at
         FROM labels WHERE student_id = ? ORDER BY juz",
    )?;
    let labels = stmt
        .query_map([student_id], label_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(labels)
}

/// Leaderboard for one group. Students without a ledger row count as zero;
/// equal totals are ordered by student id so the ranking is reproducible.
pub fn rank(conn: &Connection, group_id: &str) -> Result<Vec<RankEntry>> {
    crate::roster::get_group(conn, group_id)?;
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name,
                COALESCE(l.total_points, 0),
                COALESCE(l.memorization_points, 0),
                COALESCE(l.quiz_points, 0)
         FROM users u
         LEFT JOIN student_ledgers l ON l.student_id = u.id
         WHERE u.group_id = ? AND u.role = 'student'
         ORDER BY 3 DESC, u.id ASC",
    )?;
    let rows = stmt
        .query_map([group_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                Totals {
                    total_points: r.get(2)?,
                    memorization_points: r.get(3)?,
                    quiz_points: r.get(4)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (student_id, name, totals))| RankEntry {
            rank: i + 1,
            student_id,
            name,
            totals,
        })
        .collect())
}

/// Replays accepted submissions whose credit or label is missing.
///
/// Acceptances recorded by the review workflow are always complete, so on a
/// healthy workspace this is a no-op; it repairs data written by older
/// clients that updated the submission and the ledger separately.
pub fn reconcile(conn: &Connection, student_id: &str) -> Result<ReconcileReport> {
    ensure_student(conn, student_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, juz, points_awarded, COALESCE(reviewer_id, '')
         FROM submissions
         WHERE student_id = ? AND status = 'accepted'
         ORDER BY submitted_on, rowid",
    )?;
    let accepted = stmt
        .query_map([student_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let tx = conn.unchecked_transaction()?;
    let mut report = ReconcileReport::default();
    for (submission_id, juz, points, reviewer_id) in accepted {
        let key = submission_source_key(&submission_id);
        if add_points(&tx, student_id, PointBucket::Memorization, points, Some(&key))? {
            report.credits_applied += 1;
            report.points_applied += points;
        }
        if issue_label_if_absent(&tx, student_id, juz, &reviewer_id, &default_label_note(juz))?
            .is_some()
        {
            report.labels_issued += 1;
        }
    }
    tx.commit()?;

    if report.credits_applied > 0 || report.labels_issued > 0 {
        info!(
            student_id,
            credits = report.credits_applied,
            labels = report.labels_issued,
            "ledger reconciled"
        );
    }
    Ok(report)
}
