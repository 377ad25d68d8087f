use chrono::NaiveDate;
use ngajid::db;
use ngajid::ledger;
use ngajid::model::{Outcome, Reference, Role, SubmissionKind, SubmissionStatus};
use ngajid::roster;
use ngajid::submissions::{self, NewSubmission};
use ngajid::workflow::{self, DecideRequest};
use ngajid::NgajiError;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[test]
fn racing_reviewers_credit_a_submission_once() {
    let workspace = temp_dir("ngaji-concurrent-decide");
    let timeout = Duration::from_secs(10);

    let (teacher_a, teacher_b, student, submission) = {
        let conn = db::open_db(&workspace, timeout).expect("open db");
        let a = roster::register_user(&conn, "Ustadz Ali", Role::Teacher, None).expect("teacher a");
        let group = roster::create_group(&conn, &a.id, "Halaqah Maghrib", "").expect("group");
        let b = roster::register_user(&conn, "Ustadz Bakr", Role::Teacher, Some(&group.id)).expect("teacher b");
        let s = roster::register_user(&conn, "Khadijah", Role::Student, Some(&group.id)).expect("student");
        let sub = submissions::create(
            &conn,
            NewSubmission {
                student_id: s.id.clone(),
                group_id: group.id.clone(),
                kind: SubmissionKind::Memorization,
                reference: Reference {
                    surah: "Al-Kahf".to_string(),
                    juz: 15,
                    verse_start: Some(1),
                    verse_end: Some(20),
                },
                media_uri: "media://kahf.m4a".to_string(),
                submitted_on: NaiveDate::from_ymd_opt(2026, 4, 3).expect("date"),
            },
        )
        .expect("submission");
        (a.id, b.id, s.id, sub.id)
    };

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(teacher_a, 15), (teacher_b, 20)]
        .into_iter()
        .map(|(reviewer, points)| {
            let workspace = workspace.clone();
            let barrier = Arc::clone(&barrier);
            let submission_id = submission.clone();
            std::thread::spawn(move || {
                let conn = db::open_db(&workspace, timeout).expect("open db");
                barrier.wait();
                workflow::decide(
                    &conn,
                    DecideRequest {
                        submission_id,
                        reviewer_id: reviewer,
                        outcome: Outcome::Accept,
                        note: None,
                        points: Some(points),
                    },
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one decision wins: {results:?}");
    let loser = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one decision loses");
    assert!(matches!(loser, NgajiError::State(_)), "got {loser:?}");

    let conn = db::open_db(&workspace, timeout).expect("reopen");
    let decided = submissions::get(&conn, &submission).expect("get");
    assert_eq!(decided.status, SubmissionStatus::Accepted);
    assert_eq!(decided.points_awarded, winners[0].submission.points_awarded);

    let l = ledger::get(&conn, &student).expect("ledger").expect("row");
    assert_eq!(l.totals.total_points, decided.points_awarded);
    assert_eq!(ledger::labels_for(&conn, &student).expect("labels").len(), 1);

    drop(conn);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn concurrent_quiz_credits_are_all_counted() {
    let workspace = temp_dir("ngaji-concurrent-credit");
    let timeout = Duration::from_secs(10);
    let student = {
        let conn = db::open_db(&workspace, timeout).expect("open db");
        roster::register_user(&conn, "Umar", Role::Student, None)
            .expect("student")
            .id
    };

    let threads = 4;
    let per_thread = 10;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let workspace = workspace.clone();
            let student = student.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let conn = db::open_db(&workspace, timeout).expect("open db");
                barrier.wait();
                for i in 0..per_thread {
                    let key = format!("quiz:{t}-{i}");
                    ledger::add_points(&conn, &student, ngajid::model::PointBucket::Quiz, 2, Some(&key))
                        .expect("credit");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread");
    }

    let conn = db::open_db(&workspace, timeout).expect("reopen");
    let l = ledger::get(&conn, &student).expect("ledger").expect("row");
    assert_eq!(l.totals.quiz_points, (threads * per_thread * 2) as i64);
    assert_eq!(l.totals.total_points, l.totals.quiz_points);

    drop(conn);
    let _ = std::fs::remove_dir_all(workspace);
}
