use rusqlite::Connection;
use serde_json::json;

use crate::config::ReviewPolicy;
use crate::error::Result;
use crate::ipc::helpers::{required_i64, to_json, with_db};
use crate::ipc::types::{AppState, Request};

fn policy_get(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value> {
    Ok(json!({ "policy": to_json(&ReviewPolicy::load(conn)?)? }))
}

fn policy_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let policy = ReviewPolicy {
        default_points: required_i64(params, "defaultPoints")?,
    };
    policy.save(conn)?;
    Ok(json!({ "policy": to_json(&policy)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "policy.get" => policy_get,
        "policy.update" => policy_update,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
