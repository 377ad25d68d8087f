use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{NgajiError, Result};
use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};

/// Runs a handler body against the open workspace and wraps its result.
pub fn with_db(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => fail(&req.id, &e),
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String> {
    optional_str(params, key).ok_or_else(|| NgajiError::validation(format!("missing {}", key)))
}

/// Trimmed string param; blank counts as absent.
pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Integer param; numeric strings are accepted since form fields arrive as text.
pub fn optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| NgajiError::validation(format!("{} must be an integer", key))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| NgajiError::validation(format!("{} must be an integer", key))),
        Some(_) => Err(NgajiError::validation(format!("{} must be an integer", key))),
    }
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64> {
    optional_i64(params, key)?.ok_or_else(|| NgajiError::validation(format!("missing {}", key)))
}

pub fn optional_date(params: &serde_json::Value, key: &str) -> Result<Option<NaiveDate>> {
    match optional_str(params, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| NgajiError::validation(format!("{} must be YYYY-MM-DD", key))),
    }
}

pub fn to_json<T: serde::Serialize>(v: &T) -> Result<serde_json::Value> {
    serde_json::to_value(v).map_err(|e| NgajiError::Transport(e.to_string()))
}
