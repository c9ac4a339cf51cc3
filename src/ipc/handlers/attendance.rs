use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, is_constraint_violation, parse_now_param, required_str, resolve_teacher,
};
use crate::ipc::types::{AppState, Request};
use crate::score;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn attendance_mark(state: &AppState, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;
    resolve_teacher(conn, req, &teacher_id)?;

    let now = parse_now_param(req)?;
    let today = now.date().to_string();

    // Pre-check for a clean rejection; the UNIQUE(teacher_id, date) constraint
    // below is what actually guarantees at-most-one mark per day under
    // concurrent callers.
    let already: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM attendance WHERE teacher_id = ? AND date = ?",
            (&teacher_id, &today),
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    if already.is_some() {
        return Err(err(
            &req.id,
            "already_marked",
            "attendance already marked for today",
            None,
        ));
    }

    let (tier, points) = score::classify_mark(now.time());
    let marked_time = now.time().format("%H:%M").to_string();
    let attendance_id = Uuid::new_v4().to_string();

    if let Err(e) = conn.execute(
        "INSERT INTO attendance(id, teacher_id, date, marked_time, tier, points)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &attendance_id,
            &teacher_id,
            &today,
            &marked_time,
            tier.as_str(),
            points,
        ),
    ) {
        if is_constraint_violation(&e) {
            // A concurrent mark won the race; surface it as the same rejection.
            return Err(err(
                &req.id,
                "already_marked",
                "attendance already marked for today",
                None,
            ));
        }
        return Err(err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "attendance" })),
        ));
    }

    Ok(ok(
        &req.id,
        json!({
            "attendanceId": attendance_id,
            "teacherId": teacher_id,
            "date": today,
            "time": marked_time,
            "status": tier.as_str(),
            "score": points
        }),
    ))
}

fn attendance_list_for_teacher(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;
    resolve_teacher(conn, req, &teacher_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, date, marked_time, tier, points
             FROM attendance
             WHERE teacher_id = ?
             ORDER BY date DESC",
        )
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let rows = stmt
        .query_map([&teacher_id], |r| {
            Ok(json!({
                "attendanceId": r.get::<_, String>(0)?,
                "date": r.get::<_, String>(1)?,
                "time": r.get::<_, String>(2)?,
                "status": r.get::<_, String>(3)?,
                "score": r.get::<_, i64>(4)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    Ok(ok(&req.id, json!({ "records": rows })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(match attendance_mark(state, req) {
            Ok(resp) => resp,
            Err(resp) => resp,
        }),
        "attendance.listForTeacher" => Some(match attendance_list_for_teacher(state, req) {
            Ok(resp) => resp,
            Err(resp) => resp,
        }),
        _ => None,
    }
}
