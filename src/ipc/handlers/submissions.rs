use std::path::PathBuf;

use rusqlite::Connection;
use serde_json::json;

use crate::error::{NgajiError, Result};
use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::{optional_date, optional_i64, optional_str, required_i64, required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::media::{LocalMediaHost, MediaHost};
use crate::model::{Reference, Role, SubmissionKind};
use crate::roster;
use crate::submissions::{self, NewSubmission};

/// Creates a submission for the calling student. The group is taken from the
/// student's profile at submission time. Either an already uploaded
/// `mediaUri` or a local `audioPath` to upload first must be given.
fn submissions_create(
    conn: &Connection,
    media: Option<&LocalMediaHost>,
    params: &serde_json::Value,
) -> Result<serde_json::Value> {
    let student = roster::get_user(conn, &required_str(params, "studentId")?)?;
    if student.role != Role::Student {
        return Err(NgajiError::forbidden("only students submit recitations"));
    }
    let Some(group_id) = student.group_id.clone() else {
        return Err(NgajiError::state("join a group before submitting"));
    };

    let kind = SubmissionKind::parse(&required_str(params, "kind")?)?;
    let reference = Reference {
        surah: required_str(params, "surah")?,
        juz: required_i64(params, "juz")?,
        verse_start: optional_i64(params, "verseStart")?,
        verse_end: optional_i64(params, "verseEnd")?,
    };
    // Validate before uploading so a bad form never leaves an orphan recording.
    reference.validate()?;
    let submitted_on =
        optional_date(params, "submittedOn")?.unwrap_or_else(|| chrono::Local::now().date_naive());

    let media_uri = match (optional_str(params, "mediaUri"), optional_str(params, "audioPath")) {
        (Some(uri), _) => uri,
        (None, Some(path)) => {
            let host = media
                .ok_or_else(|| NgajiError::state("no media store for this workspace"))?;
            host.upload(&PathBuf::from(path))?
        }
        (None, None) => return Err(NgajiError::validation("missing mediaUri or audioPath")),
    };

    let submission = submissions::create(
        conn,
        NewSubmission {
            student_id: student.id,
            group_id,
            kind,
            reference,
            media_uri,
            submitted_on,
        },
    )?;
    Ok(json!({ "submission": to_json(&submission)? }))
}

fn submissions_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let submission = submissions::get(conn, &required_str(params, "submissionId")?)?;
    Ok(json!({ "submission": to_json(&submission)? }))
}

fn submissions_list_pending(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value> {
    let group_id = required_str(params, "groupId")?;
    roster::get_group(conn, &group_id)?;
    let queue = submissions::list_pending_by_group(conn, &group_id)?;
    Ok(json!({ "submissions": to_json(&queue)? }))
}

fn submissions_list_mine(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let student_id = required_str(params, "studentId")?;
    roster::get_user(conn, &student_id)?;
    let history = submissions::list_by_owner(conn, &student_id)?;
    Ok(json!({ "submissions": to_json(&history)? }))
}

fn handle_submissions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match submissions_create(conn, state.media.as_ref(), &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => fail(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.create" => Some(handle_submissions_create(state, req)),
        "submissions.get" => Some(with_db(state, req, submissions_get)),
        "submissions.listPending" => Some(with_db(state, req, submissions_list_pending)),
        "submissions.listMine" => Some(with_db(state, req, submissions_list_mine)),
        _ => None,
    }
}
