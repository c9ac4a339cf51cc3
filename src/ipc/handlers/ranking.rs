use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_now_param};
use crate::ipc::types::{AppState, Request};
use crate::score;
use serde_json::json;

fn activity_json(a: &score::EnrichedActivity) -> serde_json::Value {
    json!({
        "activityName": a.activity_name,
        "score": a.points,
        "createdAt": a.created_at,
        "className": a.class_name.display(score::UNKNOWN_CLASS),
        "subjectName": a.subject_name.display(score::UNKNOWN_SUBJECT),
        "chapterName": a.chapter_name.display(score::UNKNOWN_CHAPTER)
    })
}

fn ranking_leaderboard(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let mut scores =
        score::load_scores(conn).map_err(|e| err(&req.id, &e.code, e.message, None))?;
    score::sort_leaderboard(&mut scores);

    let entries: Vec<serde_json::Value> = scores
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let activities: Vec<serde_json::Value> =
                s.activities.iter().map(activity_json).collect();
            json!({
                "rank": i + 1,
                "teacherId": s.teacher.id,
                "teacherCode": s.teacher.code,
                "teacherName": s.teacher.full_name.as_deref().unwrap_or(score::UNKNOWN_TEACHER),
                "email": s.teacher.email.as_deref().unwrap_or(score::NO_EMAIL),
                "attendanceScore": s.attendance_score,
                "taskScore": s.task_score,
                "totalScore": s.total_score,
                "totalActivities": s.activity_count,
                "lastPostedAt": s.last_activity_at,
                "activities": activities
            })
        })
        .collect();

    Ok(ok(&req.id, json!({ "leaderboard": entries })))
}

fn ranking_best_teacher(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let generated_at = score::format_ts(parse_now_param(req)?);
    let scores = score::load_scores(conn).map_err(|e| err(&req.id, &e.code, e.message, None))?;
    let (top_score, winners) = score::top_teachers(&scores);

    // A tied winner must never drop out because a display lookup failed;
    // missing identity fields degrade to placeholders instead.
    let top_teachers: Vec<serde_json::Value> = winners
        .iter()
        .map(|s| {
            json!({
                "teacherId": s.teacher.id,
                "teacherCode": s.teacher.code,
                "teacherName": s.teacher.full_name.as_deref().unwrap_or(score::NAME_NOT_SET),
                "totalScore": s.total_score,
                "email": s.teacher.email
            })
        })
        .collect();

    Ok(ok(
        &req.id,
        json!({
            "topScore": top_score,
            "isTie": top_teachers.len() > 1,
            "topTeachers": top_teachers,
            "generatedAt": generated_at
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "ranking.leaderboard" => ranking_leaderboard(state, req),
        "ranking.bestTeacher" => ranking_best_teacher(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(resp) => resp,
        Err(resp) => resp,
    })
}
