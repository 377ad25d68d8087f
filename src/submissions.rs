//! Recitation submissions and their one-way review lifecycle.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::db::{column_err, now_timestamp};
use crate::error::{NgajiError, Result};
use crate::model::{Reference, Submission, SubmissionKind, SubmissionStatus};

const COLUMNS: &str = "id, student_id, group_id, kind, surah, juz, verse_start, verse_end,
    media_uri, submitted_on, status, review_note, points_awarded, reviewer_id, reviewed_at,
    created_at";

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub student_id: String,
    pub group_id: String,
    pub kind: SubmissionKind,
    pub reference: Reference,
    pub media_uri: String,
    pub submitted_on: NaiveDate,
}

/// The terminal state a reviewer moves a pending submission into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub status: SubmissionStatus,
    pub reviewer_id: String,
    pub review_note: Option<String>,
    pub points_awarded: i64,
}

impl Decision {
    fn validate(&self) -> Result<()> {
        match self.status {
            SubmissionStatus::Pending => Err(NgajiError::validation(
                "a decision must accept or reject",
            )),
            SubmissionStatus::Accepted if self.points_awarded <= 0 => Err(
                NgajiError::validation("accepted submissions must award positive points"),
            ),
            SubmissionStatus::Rejected if self.points_awarded != 0 => Err(
                NgajiError::validation("rejected submissions award no points"),
            ),
            _ if self.reviewer_id.trim().is_empty() => {
                Err(NgajiError::validation("reviewer id must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

fn submission_from_row(r: &Row<'_>) -> rusqlite::Result<Submission> {
    let kind: String = r.get(3)?;
    let submitted_on: String = r.get(9)?;
    let status: String = r.get(10)?;
    Ok(Submission {
        id: r.get(0)?,
        student_id: r.get(1)?,
        group_id: r.get(2)?,
        kind: SubmissionKind::parse(&kind).map_err(|e| column_err(3, e))?,
        reference: Reference {
            surah: r.get(4)?,
            juz: r.get(5)?,
            verse_start: r.get(6)?,
            verse_end: r.get(7)?,
        },
        media_uri: r.get(8)?,
        submitted_on: NaiveDate::parse_from_str(&submitted_on, "%Y-%m-%d").map_err(|e| {
            column_err(9, NgajiError::Transport(format!("bad submitted_on: {e}")))
        })?,
        status: SubmissionStatus::parse(&status).map_err(|e| column_err(10, e))?,
        review_note: r.get(11)?,
        points_awarded: r.get(12)?,
        reviewer_id: r.get(13)?,
        reviewed_at: r.get(14)?,
        created_at: r.get(15)?,
    })
}

pub fn create(conn: &Connection, new: NewSubmission) -> Result<Submission> {
    new.reference.validate()?;
    let media_uri = new.media_uri.trim().to_string();
    if media_uri.is_empty() {
        return Err(NgajiError::validation("media uri must not be empty"));
    }
    let student_known = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [&new.student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !student_known {
        return Err(NgajiError::not_found(format!(
            "student {} not found",
            new.student_id
        )));
    }
    let group_known = conn
        .query_row("SELECT 1 FROM groups WHERE id = ?", [&new.group_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !group_known {
        return Err(NgajiError::not_found(format!(
            "group {} not found",
            new.group_id
        )));
    }

    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        student_id: new.student_id,
        group_id: new.group_id,
        kind: new.kind,
        reference: Reference {
            surah: new.reference.surah.trim().to_string(),
            ..new.reference
        },
        media_uri,
        submitted_on: new.submitted_on,
        status: SubmissionStatus::Pending,
        review_note: None,
        points_awarded: 0,
        reviewer_id: None,
        reviewed_at: None,
        created_at: now_timestamp(),
    };

    conn.execute(
        "INSERT INTO submissions(id, student_id, group_id, kind, surah, juz, verse_start,
            verse_end, media_uri, submitted_on, status, points_awarded, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?)",
        rusqlite::params![
            submission.id,
            submission.student_id,
            submission.group_id,
            submission.kind.as_str(),
            submission.reference.surah,
            submission.reference.juz,
            submission.reference.verse_start,
            submission.reference.verse_end,
            submission.media_uri,
            submission.submitted_on.format("%Y-%m-%d").to_string(),
            submission.created_at,
        ],
    )?;
    debug!(submission_id = %submission.id, "submission created");
    Ok(submission)
}

pub fn get(conn: &Connection, id: &str) -> Result<Submission> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM submissions WHERE id = ?"),
        [id],
        submission_from_row,
    )
    .optional()?
    .ok_or_else(|| NgajiError::not_found(format!("submission {} not found", id)))
}

/// Review queue for a group: oldest submission date first, then arrival order.
/// Reviewers work this list top-down, so the order is part of the contract.
pub fn list_pending_by_group(conn: &Connection, group_id: &str) -> Result<Vec<Submission>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM submissions
         WHERE group_id = ? AND status = 'pending'
         ORDER BY submitted_on ASC, rowid ASC"
    ))?;
    let rows = stmt
        .query_map([group_id], submission_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count_pending_by_group(conn: &Connection, group_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM submissions WHERE group_id = ? AND status = 'pending'",
        [group_id],
        |r| r.get(0),
    )?)
}

/// A student's history, newest first.
pub fn list_by_owner(conn: &Connection, student_id: &str) -> Result<Vec<Submission>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM submissions
         WHERE student_id = ?
         ORDER BY submitted_on DESC, rowid DESC"
    ))?;
    let rows = stmt
        .query_map([student_id], submission_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Moves a pending submission to its terminal state.
///
/// The update is conditional on the row still being pending, so when two
/// reviewers race only one write lands and the other gets a State error.
pub fn apply_decision(conn: &Connection, id: &str, decision: &Decision) -> Result<Submission> {
    decision.validate()?;
    let changed = conn.execute(
        "UPDATE submissions
         SET status = ?, reviewer_id = ?, review_note = ?, points_awarded = ?, reviewed_at = ?
         WHERE id = ? AND status = 'pending'",
        rusqlite::params![
            decision.status.as_str(),
            decision.reviewer_id,
            decision.review_note,
            decision.points_awarded,
            now_timestamp(),
            id,
        ],
    )?;
    if changed == 0 {
        let current = get(conn, id)?;
        return Err(NgajiError::state(format!(
            "submission {} is already {}",
            id,
            current.status.as_str()
        )));
    }
    get(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::Role;
    use crate::roster;

    struct Fixture {
        conn: Connection,
        student_id: String,
        group_id: String,
    }

    fn fixture() -> Fixture {
        let conn = db::open_in_memory().expect("db");
        let teacher = roster::register_user(&conn, "Ustadzah Aminah", Role::Teacher, None).unwrap();
        let group = roster::create_group(&conn, &teacher.id, "Halaqah Subuh", "").unwrap();
        let student =
            roster::register_user(&conn, "Khadijah", Role::Student, Some(&group.id)).unwrap();
        Fixture {
            conn,
            student_id: student.id,
            group_id: group.id,
        }
    }

    fn new_submission(f: &Fixture, juz: i64, day: u32) -> NewSubmission {
        NewSubmission {
            student_id: f.student_id.clone(),
            group_id: f.group_id.clone(),
            kind: SubmissionKind::Memorization,
            reference: Reference {
                surah: "Al-Mulk".to_string(),
                juz,
                verse_start: Some(1),
                verse_end: Some(10),
            },
            media_uri: "media://abc.m4a".to_string(),
            submitted_on: NaiveDate::from_ymd_opt(2026, 3, day).expect("date"),
        }
    }

    #[test]
    fn create_starts_pending_with_zero_points() {
        let f = fixture();
        let s = create(&f.conn, new_submission(&f, 29, 1)).unwrap();
        assert_eq!(s.status, SubmissionStatus::Pending);
        assert_eq!(s.points_awarded, 0);
        assert!(s.review_note.is_none() && s.reviewer_id.is_none());
        assert_eq!(get(&f.conn, &s.id).unwrap(), s);
    }

    #[test]
    fn create_validates_juz_and_media() {
        let f = fixture();
        assert!(matches!(
            create(&f.conn, new_submission(&f, 31, 1)),
            Err(NgajiError::Validation(_))
        ));
        let mut no_media = new_submission(&f, 3, 1);
        no_media.media_uri = "  ".into();
        assert!(matches!(
            create(&f.conn, no_media),
            Err(NgajiError::Validation(_))
        ));
        let mut stranger = new_submission(&f, 3, 1);
        stranger.student_id = "ghost".into();
        assert!(matches!(
            create(&f.conn, stranger),
            Err(NgajiError::NotFound(_))
        ));
    }

    #[test]
    fn pending_queue_is_oldest_first() {
        let f = fixture();
        let late = create(&f.conn, new_submission(&f, 1, 20)).unwrap();
        let early = create(&f.conn, new_submission(&f, 2, 5)).unwrap();
        let early_twin = create(&f.conn, new_submission(&f, 3, 5)).unwrap();

        let queue: Vec<String> = list_pending_by_group(&f.conn, &f.group_id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(queue, vec![early.id.clone(), early_twin.id.clone(), late.id.clone()]);

        let mine: Vec<String> = list_by_owner(&f.conn, &f.student_id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(mine, vec![late.id, early_twin.id, early.id]);
        assert_eq!(count_pending_by_group(&f.conn, &f.group_id).unwrap(), 3);
    }

    #[test]
    fn decided_submissions_are_terminal() {
        let f = fixture();
        let s = create(&f.conn, new_submission(&f, 30, 1)).unwrap();
        let reject = Decision {
            status: SubmissionStatus::Rejected,
            reviewer_id: "t1".into(),
            review_note: Some("ulangi ayat 3".into()),
            points_awarded: 0,
        };
        let decided = apply_decision(&f.conn, &s.id, &reject).unwrap();
        assert_eq!(decided.status, SubmissionStatus::Rejected);
        assert!(decided.reviewed_at.is_some());

        let accept = Decision {
            status: SubmissionStatus::Accepted,
            reviewer_id: "t1".into(),
            review_note: None,
            points_awarded: 10,
        };
        assert!(matches!(
            apply_decision(&f.conn, &s.id, &accept),
            Err(NgajiError::State(_))
        ));
        assert!(matches!(
            apply_decision(&f.conn, "missing", &accept),
            Err(NgajiError::NotFound(_))
        ));
        assert_eq!(get(&f.conn, &s.id).unwrap().status, SubmissionStatus::Rejected);
    }

    #[test]
    fn decisions_must_respect_point_invariant() {
        let f = fixture();
        let s = create(&f.conn, new_submission(&f, 30, 1)).unwrap();
        let zero_accept = Decision {
            status: SubmissionStatus::Accepted,
            reviewer_id: "t1".into(),
            review_note: None,
            points_awarded: 0,
        };
        assert!(matches!(
            apply_decision(&f.conn, &s.id, &zero_accept),
            Err(NgajiError::Validation(_))
        ));
        let paid_reject = Decision {
            status: SubmissionStatus::Rejected,
            points_awarded: 5,
            ..zero_accept
        };
        assert!(matches!(
            apply_decision(&f.conn, &s.id, &paid_reject),
            Err(NgajiError::Validation(_))
        ));
        assert_eq!(get(&f.conn, &s.id).unwrap().status, SubmissionStatus::Pending);
    }
}
