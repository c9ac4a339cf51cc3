use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::score;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn tier_tallies(
    conn: &Connection,
    req: &Request,
    teacher_id: Option<&str>,
) -> Result<Vec<serde_json::Value>, serde_json::Value> {
    let (sql, params): (&str, Vec<&str>) = match teacher_id {
        Some(id) => (
            "SELECT tier, COUNT(*) FROM attendance WHERE teacher_id = ? GROUP BY tier",
            vec![id],
        ),
        None => ("SELECT tier, COUNT(*) FROM attendance GROUP BY tier", vec![]),
    };
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    stmt.query_map(rusqlite::params_from_iter(params), |r| {
        Ok(json!({
            "status": r.get::<_, String>(0)?,
            "total": r.get::<_, i64>(1)?
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

fn count_rows(conn: &Connection, req: &Request, table: &str) -> Result<i64, serde_json::Value> {
    // Table names come from a fixed list below, never from the request.
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    conn.query_row(&sql, [], |r| r.get(0))
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

fn dashboard_teacher(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;

    let teacher = conn
        .query_row(
            "SELECT id, teacher_code, full_name, email, status
             FROM teachers WHERE id = ?",
            [&teacher_id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "teacherCode": r.get::<_, String>(1)?,
                    "fullName": r.get::<_, String>(2)?,
                    "email": r.get::<_, String>(3)?,
                    "status": r.get::<_, String>(4)?
                }))
            },
        )
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?
        .ok_or_else(|| err(&req.id, "teacher_not_found", "teacher not found", None))?;

    let attendance_stats = tier_tallies(conn, req, Some(&teacher_id))?;

    // Rank is derived fresh from the leaderboard; nothing is cached.
    let mut scores =
        score::load_scores(conn).map_err(|e| err(&req.id, &e.code, e.message, None))?;
    score::sort_leaderboard(&mut scores);
    let ranking = scores
        .iter()
        .enumerate()
        .find(|(_, s)| s.teacher.id == teacher_id)
        .map(|(i, s)| {
            json!({
                "rank": i + 1,
                "attendanceScore": s.attendance_score,
                "taskScore": s.task_score,
                "totalScore": s.total_score
            })
        });
    let activity_count = scores
        .iter()
        .find(|s| s.teacher.id == teacher_id)
        .map(|s| s.activity_count)
        .unwrap_or(0);

    Ok(ok(
        &req.id,
        json!({
            "teacher": teacher,
            "summary": { "activities": activity_count },
            "attendanceStats": attendance_stats,
            "ranking": ranking
        }),
    ))
}

fn dashboard_admin(state: &AppState, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;

    let teachers = count_rows(conn, req, "teachers")?;
    let classes = count_rows(conn, req, "classes")?;
    let subjects = count_rows(conn, req, "subjects")?;
    let chapters = count_rows(conn, req, "chapters")?;
    let activities = count_rows(conn, req, "activities")?;

    let attendance_stats = tier_tallies(conn, req, None)?;

    let mut scores =
        score::load_scores(conn).map_err(|e| err(&req.id, &e.code, e.message, None))?;
    score::sort_leaderboard(&mut scores);
    let rankings: Vec<serde_json::Value> = scores
        .iter()
        .enumerate()
        .take(10)
        .map(|(i, s)| {
            json!({
                "rank": i + 1,
                "teacherId": s.teacher.id,
                "teacherName": s.teacher.full_name.as_deref().unwrap_or(score::UNKNOWN_TEACHER),
                "attendanceScore": s.attendance_score,
                "taskScore": s.task_score,
                "totalScore": s.total_score
            })
        })
        .collect();

    Ok(ok(
        &req.id,
        json!({
            "summary": {
                "teachers": teachers,
                "classes": classes,
                "subjects": subjects,
                "chapters": chapters,
                "activities": activities
            },
            "attendanceStats": attendance_stats,
            "rankings": rankings
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "dashboard.teacher" => dashboard_teacher(state, req),
        "dashboard.admin" => dashboard_admin(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(resp) => resp,
        Err(resp) => resp,
    })
}
