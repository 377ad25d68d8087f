//! Review decisions: the single entry point reviewers use to accept or
//! reject a pending submission.
//!
//! ```text
//! pending --accept(points)--> accepted
//! pending --reject(note)----> rejected
//! ```
//!
//! Both targets are terminal. Accepting also credits the student's ledger
//! and issues the juz label for the recited juz (hafalan and murojaah
//! alike); those writes and the status change commit together or not at all.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ReviewPolicy;
use crate::error::{NgajiError, Result};
use crate::ledger;
use crate::model::{
    validate_points, Label, Outcome, PointBucket, Role, StudentLedger, Submission, SubmissionStatus,
};
use crate::roster;
use crate::submissions::{self, Decision};

#[derive(Debug, Clone)]
pub struct DecideRequest {
    pub submission_id: String,
    pub reviewer_id: String,
    pub outcome: Outcome,
    pub note: Option<String>,
    pub points: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub submission: Submission,
    /// Ledger after the credit; absent for rejections.
    pub ledger: Option<StudentLedger>,
    /// Set only when this decision issued a new label.
    pub label: Option<Label>,
}

pub fn decide(conn: &Connection, req: DecideRequest) -> Result<DecisionOutcome> {
    let result = decide_inner(conn, &req);
    match &result {
        Ok(out) => info!(
            submission_id = %req.submission_id,
            reviewer_id = %req.reviewer_id,
            status = out.submission.status.as_str(),
            points = out.submission.points_awarded,
            label_issued = out.label.is_some(),
            "submission decided"
        ),
        Err(e) => warn!(
            submission_id = %req.submission_id,
            reviewer_id = %req.reviewer_id,
            code = e.code(),
            error = %e,
            "decision refused"
        ),
    }
    result
}

fn decide_inner(conn: &Connection, req: &DecideRequest) -> Result<DecisionOutcome> {
    let policy = ReviewPolicy::load(conn)?;
    let points = resolve_points(req.outcome, req.points, policy.default_points)?;
    let note = req
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let submission = submissions::get(conn, &req.submission_id)?;
    if submission.status.is_terminal() {
        return Err(NgajiError::state(format!(
            "submission {} is already {}",
            submission.id,
            submission.status.as_str()
        )));
    }
    authorize_reviewer(conn, &req.reviewer_id, &submission)?;

    match req.outcome {
        Outcome::Accept => record_acceptance(conn, &submission, &req.reviewer_id, note, points),
        Outcome::Reject => record_rejection(conn, &submission, &req.reviewer_id, note),
    }
}

/// Points for an accept: an absent or zero amount falls back to the policy
/// default, a negative or oversized one is refused. Rejections always carry zero.
pub fn resolve_points(outcome: Outcome, requested: Option<i64>, default_points: i64) -> Result<i64> {
    let points = match (outcome, requested) {
        (Outcome::Reject, _) => return Ok(0),
        (Outcome::Accept, Some(p)) if p != 0 => p,
        (Outcome::Accept, _) => default_points,
    };
    validate_points(points)?;
    Ok(points)
}

/// Teachers decide submissions of their own group; admins decide any.
fn authorize_reviewer(conn: &Connection, reviewer_id: &str, submission: &Submission) -> Result<()> {
    let reviewer = match roster::get_user(conn, reviewer_id) {
        Ok(u) => u,
        Err(NgajiError::NotFound(_)) => {
            return Err(NgajiError::forbidden(format!("unknown reviewer {}", reviewer_id)))
        }
        Err(e) => return Err(e),
    };
    match reviewer.role {
        Role::Admin => Ok(()),
        Role::Teacher if reviewer.group_id.as_deref() == Some(submission.group_id.as_str()) => {
            Ok(())
        }
        Role::Teacher => Err(NgajiError::forbidden(
            "teachers may only review submissions of their own group",
        )),
        other => Err(NgajiError::forbidden(format!(
            "a {} cannot review submissions",
            other.as_str()
        ))),
    }
}

/// Status change, ledger credit and label issuance in one IMMEDIATE
/// transaction. The credit is keyed by submission id, so even a replay of
/// this step cannot count the same submission twice.
pub fn record_acceptance(
    conn: &Connection,
    submission: &Submission,
    reviewer_id: &str,
    note: Option<String>,
    points: i64,
) -> Result<DecisionOutcome> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let decided = submissions::apply_decision(
        &tx,
        &submission.id,
        &Decision {
            status: SubmissionStatus::Accepted,
            reviewer_id: reviewer_id.to_string(),
            review_note: note,
            points_awarded: points,
        },
    )?;
    ledger::add_points(
        &tx,
        &decided.student_id,
        PointBucket::Memorization,
        points,
        Some(&ledger::submission_source_key(&decided.id)),
    )?;
    let juz = decided.reference.juz;
    let label = ledger::issue_label_if_absent(
        &tx,
        &decided.student_id,
        juz,
        reviewer_id,
        &ledger::default_label_note(juz),
    )?;
    let totals = ledger::get(&tx, &decided.student_id)?;

    tx.commit()?;
    Ok(DecisionOutcome {
        submission: decided,
        ledger: totals,
        label,
    })
}

fn record_rejection(
    conn: &Connection,
    submission: &Submission,
    reviewer_id: &str,
    note: Option<String>,
) -> Result<DecisionOutcome> {
    let decided = submissions::apply_decision(
        conn,
        &submission.id,
        &Decision {
            status: SubmissionStatus::Rejected,
            reviewer_id: reviewer_id.to_string(),
            review_note: note,
            points_awarded: 0,
        },
    )?;
    Ok(DecisionOutcome {
        submission: decided,
        ledger: None,
        label: None,
    })
}
