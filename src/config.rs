use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NgajiError, Result};
use crate::model::MAX_POINTS;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_FILTER: &str = "ngajid=info";

/// Points credited when a reviewer accepts without giving (or giving zero) points.
pub const DEFAULT_ACCEPT_POINTS: i64 = 10;

const POLICY_KEY: &str = "review.policy";

/// Process-level settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(ws) = lookup("NGAJI_WORKSPACE").filter(|v| !v.trim().is_empty()) {
            cfg.workspace = Some(PathBuf::from(ws));
        }
        if let Some(filter) = lookup("NGAJI_LOG").filter(|v| !v.trim().is_empty()) {
            cfg.log_filter = filter;
        }
        if let Some(raw) = lookup("NGAJI_BUSY_TIMEOUT_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("NGAJI_BUSY_TIMEOUT_MS is not a number: {raw}"))?;
            cfg.busy_timeout = Duration::from_millis(ms);
        }
        Ok(cfg)
    }
}

/// Product policy stored per workspace in the settings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPolicy {
    pub default_points: i64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            default_points: DEFAULT_ACCEPT_POINTS,
        }
    }
}

impl ReviewPolicy {
    pub fn load(conn: &Connection) -> Result<Self> {
        match settings_get_json(conn, POLICY_KEY)? {
            Some(v) => serde_json::from_value(v)
                .map_err(|e| NgajiError::Transport(format!("stored review policy is invalid: {e}"))),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, conn: &Connection) -> Result<()> {
        if self.default_points <= 0 {
            return Err(NgajiError::validation("defaultPoints must be positive"));
        }
        if self.default_points > MAX_POINTS {
            return Err(NgajiError::validation(format!(
                "defaultPoints must not exceed {}",
                MAX_POINTS
            )));
        }
        let v = serde_json::to_value(self)
            .map_err(|e| NgajiError::Transport(e.to_string()))?;
        settings_set_json(conn, POLICY_KEY, &v)
    }
}

pub fn settings_get_json(conn: &Connection, key: &str) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    match raw {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| NgajiError::Transport(format!("setting {key} is not JSON: {e}"))),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("NGAJI_WORKSPACE", "/tmp/ngaji"),
            ("NGAJI_BUSY_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).expect("config");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ngaji")));
        assert_eq!(cfg.busy_timeout, Duration::from_millis(250));
        assert_eq!(cfg.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = Config::from_lookup(|k| (k == "NGAJI_BUSY_TIMEOUT_MS").then(|| "soon".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn policy_defaults_then_persists() {
        let conn = db::open_in_memory().expect("db");
        assert_eq!(ReviewPolicy::load(&conn).unwrap().default_points, 10);
        ReviewPolicy { default_points: 25 }.save(&conn).unwrap();
        assert_eq!(ReviewPolicy::load(&conn).unwrap().default_points, 25);
        assert!(ReviewPolicy { default_points: 0 }.save(&conn).is_err());
        assert!(matches!(
            ReviewPolicy { default_points: MAX_POINTS + 1 }.save(&conn),
            Err(NgajiError::Validation(_))
        ));
        assert_eq!(ReviewPolicy::load(&conn).unwrap().default_points, 25);
    }
}
