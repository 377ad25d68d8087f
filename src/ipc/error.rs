use serde_json::json;

use crate::error::NgajiError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Envelope for a domain failure; tells the UI whether a retry can help.
pub fn fail(id: &str, e: &NgajiError) -> serde_json::Value {
    err(
        id,
        e.code(),
        e.to_string(),
        Some(json!({ "retryable": e.is_retryable() })),
    )
}
