use rusqlite::Connection;
use serde_json::json;

use crate::error::Result;
use crate::ipc::helpers::{required_i64, required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::model::PointBucket;

fn ledger_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let l = ledger::get_or_create(conn, &required_str(params, "studentId")?)?;
    Ok(json!({ "ledger": to_json(&l)? }))
}

fn ledger_labels(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let labels = ledger::labels_for(conn, &required_str(params, "studentId")?)?;
    Ok(json!({ "labels": to_json(&labels)? }))
}

fn ledger_rank(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let board = ledger::rank(conn, &required_str(params, "groupId")?)?;
    Ok(json!({ "entries": to_json(&board)? }))
}

/// Entry point for the quiz collaborator. The key identifies the quiz
/// attempt so a resent request is not credited twice.
fn ledger_add_quiz_points(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let student_id = required_str(params, "studentId")?;
    let points = required_i64(params, "points")?;
    let source_key = format!("quiz:{}", required_str(params, "attemptId")?);
    let applied = ledger::add_points(conn, &student_id, PointBucket::Quiz, points, Some(&source_key))?;
    let l = ledger::get_or_create(conn, &student_id)?;
    Ok(json!({ "applied": applied, "ledger": to_json(&l)? }))
}

fn ledger_reconcile(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let student_id = required_str(params, "studentId")?;
    let report = ledger::reconcile(conn, &student_id)?;
    let l = ledger::get_or_create(conn, &student_id)?;
    Ok(json!({ "report": to_json(&report)?, "ledger": to_json(&l)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "ledger.get" => ledger_get,
        "ledger.labels" => ledger_labels,
        "ledger.rank" => ledger_rank,
        "ledger.addQuizPoints" => ledger_add_quiz_points,
        "ledger.reconcile" => ledger_reconcile,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
