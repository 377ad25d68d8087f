use rusqlite::Connection;

use crate::error::Result;
use crate::ipc::helpers::{optional_i64, optional_str, required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::Outcome;
use crate::workflow::{self, DecideRequest};

fn review_decide(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let req = DecideRequest {
        submission_id: required_str(params, "submissionId")?,
        reviewer_id: required_str(params, "reviewerId")?,
        outcome: Outcome::parse(&required_str(params, "outcome")?)?,
        note: optional_str(params, "note"),
        points: optional_i64(params, "points")?,
    };
    to_json(&workflow::decide(conn, req)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "review.decide" => Some(with_db(state, req, review_decide)),
        _ => None,
    }
}
