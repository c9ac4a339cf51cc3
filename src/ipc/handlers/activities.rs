use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_now_param, required_str, resolve_teacher};
use crate::ipc::types::{AppState, Request};
use crate::score;
use serde_json::json;
use uuid::Uuid;

fn activities_add(state: &AppState, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;
    let class_id = required_str(req, "classId")?;
    let subject_id = required_str(req, "subjectId")?;
    let chapter_id = required_str(req, "chapterId")?;
    let activity_name = required_str(req, "activityName")?;
    resolve_teacher(conn, req, &teacher_id)?;

    let now = parse_now_param(req)?;
    let activity_id = Uuid::new_v4().to_string();
    let created_at = score::format_ts(now);

    conn.execute(
        "INSERT INTO activities(id, teacher_id, class_id, subject_id, chapter_id,
                                activity_name, task_score, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &activity_id,
            &teacher_id,
            &class_id,
            &subject_id,
            &chapter_id,
            &activity_name,
            score::ACTIVITY_POINTS,
            &created_at,
        ),
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "activities" })),
        )
    })?;

    Ok(ok(
        &req.id,
        json!({
            "activityId": activity_id,
            "teacherId": teacher_id,
            "classId": class_id,
            "subjectId": subject_id,
            "chapterId": chapter_id,
            "activityName": activity_name,
            "taskScore": score::ACTIVITY_POINTS,
            "createdAt": created_at
        }),
    ))
}

fn activities_rename(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let activity_id = required_str(req, "activityId")?;
    let teacher_id = required_str(req, "teacherId")?;
    let new_name = required_str(req, "newName")?;
    resolve_teacher(conn, req, &teacher_id)?;

    // Ownership is part of the predicate: a non-owner learns nothing about
    // whether the activity exists.
    let changed = conn
        .execute(
            "UPDATE activities SET activity_name = ? WHERE id = ? AND teacher_id = ?",
            (&new_name, &activity_id, &teacher_id),
        )
        .map_err(|e| {
            err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "table": "activities" })),
            )
        })?;
    if changed == 0 {
        return Err(err(
            &req.id,
            "forbidden",
            "not allowed to modify this activity",
            None,
        ));
    }

    Ok(ok(
        &req.id,
        json!({ "activityId": activity_id, "activityName": new_name }),
    ))
}

fn activities_delete(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let activity_id = required_str(req, "activityId")?;
    let teacher_id = required_str(req, "teacherId")?;
    resolve_teacher(conn, req, &teacher_id)?;

    let removed = conn
        .execute(
            "DELETE FROM activities WHERE id = ? AND teacher_id = ?",
            (&activity_id, &teacher_id),
        )
        .map_err(|e| {
            err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "activities" })),
            )
        })?;
    if removed == 0 {
        return Err(err(
            &req.id,
            "forbidden",
            "not allowed to delete this activity",
            None,
        ));
    }

    Ok(ok(&req.id, json!({ "ok": true })))
}

fn activities_list_for_teacher(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;
    resolve_teacher(conn, req, &teacher_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT a.id, a.activity_name, a.task_score, a.created_at,
                    c.name, s.name, ch.name
             FROM activities a
             LEFT JOIN classes c ON c.id = a.class_id
             LEFT JOIN subjects s ON s.id = a.subject_id
             LEFT JOIN chapters ch ON ch.id = a.chapter_id
             WHERE a.teacher_id = ?
             ORDER BY a.created_at DESC, a.rowid DESC",
        )
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let rows = stmt
        .query_map([&teacher_id], |r| {
            let class_name = score::RefName::from_lookup(r.get(4)?);
            let subject_name = score::RefName::from_lookup(r.get(5)?);
            let chapter_name = score::RefName::from_lookup(r.get(6)?);
            Ok(json!({
                "activityId": r.get::<_, String>(0)?,
                "activityName": r.get::<_, String>(1)?,
                "score": r.get::<_, i64>(2)?,
                "createdAt": r.get::<_, String>(3)?,
                "className": class_name.display(score::UNKNOWN_CLASS),
                "subjectName": subject_name.display(score::UNKNOWN_SUBJECT),
                "chapterName": chapter_name.display(score::UNKNOWN_CHAPTER)
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    Ok(ok(&req.id, json!({ "activities": rows })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "activities.add" => activities_add(state, req),
        "activities.rename" => activities_rename(state, req),
        "activities.delete" => activities_delete(state, req),
        "activities.listForTeacher" => activities_list_for_teacher(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(resp) => resp,
        Err(resp) => resp,
    })
}
