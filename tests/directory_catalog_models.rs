
use serde_json::json;
use test_support::{
    create_catalog, create_teacher, mark_attendance, request_err, request_ok, select_workspace,
    spawn_sidecar,
};

#[test]
fn rosters_and_catalog_lists_reflect_creates_and_deletes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    // No workspace selected yet.
    let health = request_ok(&mut stdin, &mut reader, "health-1", "health", json!({}));
    assert!(health
        .get("workspacePath")
        .map(|v| v.is_null())
        .unwrap_or(true));

    let workspace = select_workspace(&mut stdin, &mut reader, "staffroom-directory");
    let health = request_ok(&mut stdin, &mut reader, "health-2", "health", json!({}));
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );

    let amina = create_teacher(&mut stdin, &mut reader, "Amina Warsame");
    let bashir = create_teacher(&mut stdin, &mut reader, "Bashir Cali");
    let catalog = create_catalog(&mut stdin, &mut reader, &amina, "dir");

    let _ = mark_attendance(&mut stdin, &mut reader, &amina, "2026-03-02T07:30:00");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "add",
        "activities.add",
        json!({
            "teacherId": amina,
            "classId": catalog.class_id,
            "subjectId": catalog.subject_id,
            "chapterId": catalog.chapter_id,
            "activityName": "Fieldwork notes",
            "now": "2026-03-02T10:00:00"
        }),
    );

    let roster = request_ok(&mut stdin, &mut reader, "roster", "teachers.list", json!({}));
    let teachers = roster
        .get("teachers")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(teachers.len(), 2);
    // Creation order.
    assert_eq!(
        teachers[0].get("id").and_then(|v| v.as_str()),
        Some(amina.as_str())
    );
    assert_eq!(
        teachers[0].get("attendanceCount").and_then(|v| v.as_i64()),
        Some(1)
    );
    assert_eq!(
        teachers[0].get("activityCount").and_then(|v| v.as_i64()),
        Some(1)
    );
    assert_eq!(
        teachers[1].get("attendanceCount").and_then(|v| v.as_i64()),
        Some(0)
    );

    let classes = request_ok(&mut stdin, &mut reader, "classes", "classes.list", json!({}));
    let class_rows = classes
        .get("classes")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(class_rows.len(), 1);
    assert_eq!(
        class_rows[0].get("chapterCount").and_then(|v| v.as_i64()),
        Some(1)
    );
    assert_eq!(
        class_rows[0].get("activityCount").and_then(|v| v.as_i64()),
        Some(1)
    );

    let subjects = request_ok(
        &mut stdin,
        &mut reader,
        "subjects",
        "subjects.list",
        json!({}),
    );
    assert_eq!(
        subjects
            .get("subjects")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let chapters = request_ok(
        &mut stdin,
        &mut reader,
        "chapters",
        "chapters.list",
        json!({}),
    );
    let chapter_rows = chapters
        .get("chapters")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(chapter_rows.len(), 1);
    assert_eq!(
        chapter_rows[0].get("className").and_then(|v| v.as_str()),
        Some("Form dir")
    );

    // Subject names are unique per workspace.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "dup-subject",
        "subjects.create",
        json!({ "name": "Subject dir" }),
    );
    assert_eq!(code, "duplicate_name");

    // Deleting an unknown class is reported, not ignored.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "delete-ghost-class",
        "classes.delete",
        json!({ "classId": "no-such-class" }),
    );
    assert_eq!(code, "not_found");

    // Removing a teacher takes their records with them.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "delete-amina",
        "teachers.delete",
        json!({ "teacherId": amina }),
    );
    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "roster-after",
        "teachers.list",
        json!({}),
    );
    let teachers = roster
        .get("teachers")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(teachers.len(), 1);
    assert_eq!(
        teachers[0].get("id").and_then(|v| v.as_str()),
        Some(bashir.as_str())
    );

    let board = request_ok(
        &mut stdin,
        &mut reader,
        "board",
        "ranking.leaderboard",
        json!({}),
    );
    let entries = board
        .get("leaderboard")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].get("totalScore").and_then(|v| v.as_i64()),
        Some(0)
    );
}
