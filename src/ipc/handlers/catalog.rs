use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{is_constraint_violation, required_str};
use crate::ipc::types::{AppState, Request};
use crate::score;
use chrono::Local;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    // Correlated subqueries avoid double-counting from joins.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           (SELECT COUNT(*) FROM chapters ch WHERE ch.class_id = c.id) AS chapter_count,
           (SELECT COUNT(*) FROM activities a WHERE a.class_id = c.id) AS activity_count
         FROM classes c
         ORDER BY c.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "chapterCount": row.get::<_, i64>(2)?,
                "activityCount": row.get::<_, i64>(3)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let class_id = Uuid::new_v4().to_string();
    let created_at = score::format_ts(Local::now().naive_local());
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name, created_at) VALUES(?, ?, ?)",
        (&class_id, &name, &created_at),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    ok(&req.id, json!({ "classId": class_id, "name": name }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&class_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    // Activities keep their class_id; the leaderboard renders them with a
    // placeholder class name from here on.
    if let Err(e) = conn.execute("DELETE FROM classes WHERE id = ?", [&class_id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };

    let mut stmt = match conn.prepare("SELECT id, name FROM subjects ORDER BY name") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let subject_id = Uuid::new_v4().to_string();
    let created_at = score::format_ts(Local::now().naive_local());
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, name, created_at) VALUES(?, ?, ?)",
        (&subject_id, &name, &created_at),
    ) {
        if is_constraint_violation(&e) {
            return err(
                &req.id,
                "duplicate_name",
                format!("subject already exists: {}", name),
                None,
            );
        }
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    ok(&req.id, json!({ "subjectId": subject_id, "name": name }))
}

fn handle_chapters_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "chapters": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT ch.id, ch.name, ch.class_id, ch.subject_id, ch.teacher_id,
                c.name, s.name
         FROM chapters ch
         LEFT JOIN classes c ON c.id = ch.class_id
         LEFT JOIN subjects s ON s.id = ch.subject_id
         ORDER BY ch.created_at, ch.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let class_name = score::RefName::from_lookup(row.get(5)?);
            let subject_name = score::RefName::from_lookup(row.get(6)?);
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "classId": row.get::<_, String>(2)?,
                "subjectId": row.get::<_, String>(3)?,
                "teacherId": row.get::<_, String>(4)?,
                "className": class_name.display(score::UNKNOWN_CLASS),
                "subjectName": subject_name.display(score::UNKNOWN_SUBJECT)
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(chapters) => ok(&req.id, json!({ "chapters": chapters })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_chapters_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let chapter_id = Uuid::new_v4().to_string();
    let created_at = score::format_ts(Local::now().naive_local());
    if let Err(e) = conn.execute(
        "INSERT INTO chapters(id, class_id, subject_id, teacher_id, name, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &chapter_id,
            &class_id,
            &subject_id,
            &teacher_id,
            &name,
            &created_at,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "chapters" })),
        );
    }

    ok(&req.id, json!({ "chapterId": chapter_id, "name": name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "chapters.list" => Some(handle_chapters_list(state, req)),
        "chapters.create" => Some(handle_chapters_create(state, req)),
        _ => None,
    }
}
