use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{is_constraint_violation, required_str};
use crate::ipc::types::{AppState, Request};
use crate::score;
use chrono::Local;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };

    // Include record counts so the admin screen can show a useful roster.
    let mut stmt = match conn.prepare(
        "SELECT
           t.id,
           t.teacher_code,
           t.full_name,
           t.email,
           t.status,
           (SELECT COUNT(*) FROM attendance a WHERE a.teacher_id = t.id) AS attendance_count,
           (SELECT COUNT(*) FROM activities ac WHERE ac.teacher_id = t.id) AS activity_count
         FROM teachers t
         ORDER BY t.created_at, t.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "teacherCode": row.get::<_, String>(1)?,
                "fullName": row.get::<_, String>(2)?,
                "email": row.get::<_, String>(3)?,
                "status": row.get::<_, String>(4)?,
                "attendanceCount": row.get::<_, i64>(5)?,
                "activityCount": row.get::<_, i64>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let full_name = match required_str(req, "fullName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let teacher_id = Uuid::new_v4().to_string();
    let teacher_code = match req.params.get("teacherCode").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => format!("T-{}", &teacher_id[..8]),
    };
    let created_at = score::format_ts(Local::now().naive_local());

    if let Err(e) = conn.execute(
        "INSERT INTO teachers(id, teacher_code, full_name, email, status, created_at)
         VALUES(?, ?, ?, ?, 'active', ?)",
        (&teacher_id, &teacher_code, &full_name, &email, &created_at),
    ) {
        if is_constraint_violation(&e) {
            return err(
                &req.id,
                "duplicate_code",
                format!("teacher code already in use: {}", teacher_code),
                None,
            );
        }
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    ok(
        &req.id,
        json!({
            "teacherId": teacher_id,
            "teacherCode": teacher_code,
            "fullName": full_name,
            "email": email,
            "status": "active"
        }),
    )
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [&teacher_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "teacher_not_found", "teacher not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Chapters authored by the teacher stay behind; activities pointing at
    // them degrade to placeholder names during enrichment.
    if let Err(e) = tx.execute("DELETE FROM attendance WHERE teacher_id = ?", [&teacher_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "attendance" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM activities WHERE teacher_id = ?", [&teacher_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "activities" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM teachers WHERE id = ?", [&teacher_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        _ => None,
    }
}
