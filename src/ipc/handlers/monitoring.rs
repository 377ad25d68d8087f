use rusqlite::Connection;
use serde_json::json;

use crate::error::Result;
use crate::ipc::helpers::{required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::monitoring;

fn monitoring_student(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let progress = monitoring::student_progress(conn, &required_str(params, "studentId")?)?;
    Ok(json!({ "progress": to_json(&progress)? }))
}

fn monitoring_group(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let students = monitoring::group_progress(conn, &required_str(params, "groupId")?)?;
    Ok(json!({ "students": to_json(&students)? }))
}

fn monitoring_dashboard(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let dashboard = monitoring::teacher_dashboard(conn, &required_str(params, "groupId")?)?;
    to_json(&dashboard)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "monitoring.student" => monitoring_student,
        "monitoring.group" => monitoring_group,
        "monitoring.dashboard" => monitoring_dashboard,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
