use chrono::{DateTime, Local, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::score;

pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(info, _)
            if info.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let raw = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    if raw.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        ));
    }
    Ok(raw)
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Wall-clock injection point: time-dependent operations accept an optional
/// `now` param so tests can pin the clock. The system clock is only consulted
/// here, never inside the scoring logic.
pub fn parse_now_param(req: &Request) -> Result<NaiveDateTime, serde_json::Value> {
    let Some(raw) = req.params.get("now") else {
        return Ok(Local::now().naive_local());
    };
    if raw.is_null() {
        return Ok(Local::now().naive_local());
    }
    let Some(text) = raw.as_str() else {
        return Err(err(
            &req.id,
            "bad_params",
            "now must be a timestamp string",
            None,
        ));
    };
    if let Ok(ndt) = NaiveDateTime::parse_from_str(text, score::TS_FORMAT) {
        return Ok(ndt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    Err(err(
        &req.id,
        "bad_params",
        "now must be YYYY-MM-DDTHH:MM:SS or RFC 3339",
        None,
    ))
}

/// Resolve a caller-supplied teacher id against the directory. Operations that
/// act as a teacher require the identity to exist before touching records.
pub fn resolve_teacher(
    conn: &Connection,
    req: &Request,
    teacher_id: &str,
) -> Result<(), serde_json::Value> {
    let found = conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [teacher_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    if found.is_none() {
        return Err(err(
            &req.id,
            "teacher_not_found",
            "teacher not found",
            None,
        ));
    }
    Ok(())
}
