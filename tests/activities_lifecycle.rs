
use serde_json::json;
use test_support::{
    create_catalog, create_teacher, request_err, request_ok, select_workspace, spawn_sidecar,
};

#[test]
fn add_rename_delete_with_ownership_checks() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "staffroom-activities");
    let owner = create_teacher(&mut stdin, &mut reader, "Amina Warsame");
    let intruder = create_teacher(&mut stdin, &mut reader, "Bashir Cali");
    let catalog = create_catalog(&mut stdin, &mut reader, &owner, "alg");

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "add",
        "activities.add",
        json!({
            "teacherId": owner,
            "classId": catalog.class_id,
            "subjectId": catalog.subject_id,
            "chapterId": catalog.chapter_id,
            "activityName": "Fractions drill",
            "now": "2026-03-02T10:00:00"
        }),
    );
    let activity_id = added
        .get("activityId")
        .and_then(|v| v.as_str())
        .expect("activityId")
        .to_string();
    // The point value is fixed at creation, not caller-supplied.
    assert_eq!(added.get("taskScore").and_then(|v| v.as_i64()), Some(2));

    // Another teacher can neither rename nor delete it.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "rename-intruder",
        "activities.rename",
        json!({ "activityId": activity_id, "teacherId": intruder, "newName": "Hijacked" }),
    );
    assert_eq!(code, "forbidden");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "delete-intruder",
        "activities.delete",
        json!({ "activityId": activity_id, "teacherId": intruder }),
    );
    assert_eq!(code, "forbidden");

    // Untouched by the failed attempts.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list-owner",
        "activities.listForTeacher",
        json!({ "teacherId": owner }),
    );
    let activities = listed
        .get("activities")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(activities.len(), 1);
    assert_eq!(
        activities[0].get("activityName").and_then(|v| v.as_str()),
        Some("Fractions drill")
    );
    assert_eq!(
        activities[0].get("className").and_then(|v| v.as_str()),
        Some("Form alg")
    );

    // The owner renames it; only the name changes.
    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "rename-owner",
        "activities.rename",
        json!({ "activityId": activity_id, "teacherId": owner, "newName": "Decimals drill" }),
    );
    assert_eq!(
        renamed.get("activityName").and_then(|v| v.as_str()),
        Some("Decimals drill")
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list-after-rename",
        "activities.listForTeacher",
        json!({ "teacherId": owner }),
    );
    let activities = listed
        .get("activities")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(activities[0].get("score").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        activities[0].get("createdAt").and_then(|v| v.as_str()),
        Some("2026-03-02T10:00:00")
    );

    // The owner deletes it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "delete-owner",
        "activities.delete",
        json!({ "activityId": activity_id, "teacherId": owner }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list-after-delete",
        "activities.listForTeacher",
        json!({ "teacherId": owner }),
    );
    let activities = listed
        .get("activities")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert!(activities.is_empty());
}

#[test]
fn add_validates_fields_and_identity() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "staffroom-activities-validate");
    let teacher_id = create_teacher(&mut stdin, &mut reader, "Caaliya Nuur");
    let catalog = create_catalog(&mut stdin, &mut reader, &teacher_id, "val");

    // Missing chapterId.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "missing-field",
        "activities.add",
        json!({
            "teacherId": teacher_id,
            "classId": catalog.class_id,
            "subjectId": catalog.subject_id,
            "activityName": "Geometry recap"
        }),
    );
    assert_eq!(code, "bad_params");

    // Whitespace-only name.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "blank-name",
        "activities.add",
        json!({
            "teacherId": teacher_id,
            "classId": catalog.class_id,
            "subjectId": catalog.subject_id,
            "chapterId": catalog.chapter_id,
            "activityName": "   "
        }),
    );
    assert_eq!(code, "bad_params");

    // Unresolved caller identity.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "ghost-teacher",
        "activities.add",
        json!({
            "teacherId": "no-such-teacher",
            "classId": catalog.class_id,
            "subjectId": catalog.subject_id,
            "chapterId": catalog.chapter_id,
            "activityName": "Geometry recap"
        }),
    );
    assert_eq!(code, "teacher_not_found");

    // Nothing was created along the way.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "activities.listForTeacher",
        json!({ "teacherId": teacher_id }),
    );
    let activities = listed
        .get("activities")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert!(activities.is_empty());
}
