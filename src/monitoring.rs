use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::model::{Submission, SubmissionStatus};
use crate::{ledger, roster, submissions};

const RECENT_ACTIVITY: usize = 5;
const DASHBOARD_RECENT: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student_id: String,
    pub name: String,
    pub total_submissions: usize,
    pub accepted_submissions: usize,
    pub total_points: i64,
    pub label_count: usize,
    pub recent: Vec<Submission>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDashboard {
    pub group_id: String,
    pub pending_count: i64,
    pub student_count: usize,
    pub recent_pending: Vec<Submission>,
}

pub fn student_progress(conn: &Connection, student_id: &str) -> Result<StudentProgress> {
    let student = roster::get_user(conn, student_id)?;
    let history = submissions::list_by_owner(conn, student_id)?;
    let accepted = history
        .iter()
        .filter(|s| s.status == SubmissionStatus::Accepted)
        .count();
    let total_points = ledger::get(conn, student_id)?
        .map(|l| l.totals.total_points)
        .unwrap_or(0);
    let label_count = ledger::labels_for(conn, student_id)?.len();

    Ok(StudentProgress {
        student_id: student.id,
        name: student.name,
        total_submissions: history.len(),
        accepted_submissions: accepted,
        total_points,
        label_count,
        recent: history.into_iter().take(RECENT_ACTIVITY).collect(),
    })
}

/// Progress for every student of a group, in roster order.
pub fn group_progress(conn: &Connection, group_id: &str) -> Result<Vec<StudentProgress>> {
    roster::list_students(conn, group_id)?
        .iter()
        .map(|s| student_progress(conn, &s.id))
        .collect()
}

pub fn teacher_dashboard(conn: &Connection, group_id: &str) -> Result<TeacherDashboard> {
    let student_count = roster::list_students(conn, group_id)?.len();
    let pending_count = submissions::count_pending_by_group(conn, group_id)?;
    // Newest first here, unlike the review queue.
    let mut recent_pending = submissions::list_pending_by_group(conn, group_id)?;
    recent_pending.reverse();
    recent_pending.truncate(DASHBOARD_RECENT);

    Ok(TeacherDashboard {
        group_id: group_id.to_string(),
        pending_count,
        student_count,
        recent_pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{Outcome, Reference, Role, SubmissionKind};
    use crate::submissions::NewSubmission;
    use crate::workflow::{self, DecideRequest};
    use chrono::NaiveDate;

    #[test]
    fn dashboard_counts_queue_and_shows_newest_pending() {
        let conn = db::open_in_memory().expect("db");
        let teacher = roster::register_user(&conn, "Ustadz Idris", Role::Teacher, None).unwrap();
        let group = roster::create_group(&conn, &teacher.id, "Halaqah", "").unwrap();
        let a = roster::register_user(&conn, "Aminah", Role::Student, Some(&group.id)).unwrap();
        let b = roster::register_user(&conn, "Bashir", Role::Student, Some(&group.id)).unwrap();

        let mut ids = Vec::new();
        for (day, student) in [(1, &a), (2, &b), (3, &a), (4, &b), (5, &a)] {
            let s = submissions::create(
                &conn,
                NewSubmission {
                    student_id: student.id.clone(),
                    group_id: group.id.clone(),
                    kind: SubmissionKind::Memorization,
                    reference: Reference {
                        surah: "Al-Insyirah".to_string(),
                        juz: 30,
                        verse_start: None,
                        verse_end: None,
                    },
                    media_uri: "media://r.m4a".to_string(),
                    submitted_on: NaiveDate::from_ymd_opt(2026, 7, day).unwrap(),
                },
            )
            .unwrap();
            ids.push(s.id);
        }
        workflow::decide(
            &conn,
            DecideRequest {
                submission_id: ids[4].clone(),
                reviewer_id: teacher.id.clone(),
                outcome: Outcome::Accept,
                note: None,
                points: Some(8),
            },
        )
        .unwrap();

        let dash = teacher_dashboard(&conn, &group.id).unwrap();
        assert_eq!(dash.pending_count, 4);
        assert_eq!(dash.student_count, 2);
        let recent: Vec<_> = dash.recent_pending.iter().map(|s| s.id.clone()).collect();
        assert_eq!(recent, vec![ids[3].clone(), ids[2].clone(), ids[1].clone()]);

        let progress = student_progress(&conn, &a.id).unwrap();
        assert_eq!(progress.total_submissions, 3);
        assert_eq!(progress.accepted_submissions, 1);
        assert_eq!(progress.total_points, 8);
        assert_eq!(progress.label_count, 1);
        assert_eq!(progress.recent[0].id, ids[4]);

        let everyone = group_progress(&conn, &group.id).unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[test]
    fn dashboard_for_unknown_group_is_not_found() {
        let conn = db::open_in_memory().expect("db");
        assert!(matches!(
            teacher_dashboard(&conn, "no-such-group"),
            Err(crate::error::NgajiError::NotFound(_))
        ));
        assert!(matches!(
            group_progress(&conn, "no-such-group"),
            Err(crate::error::NgajiError::NotFound(_))
        ));
    }
}
