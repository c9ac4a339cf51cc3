use chrono::{NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use std::collections::HashMap;

/// Every logged activity is worth the same fixed number of points; the value
/// is assigned at creation and never caller-supplied.
pub const ACTIVITY_POINTS: i64 = 2;

pub const UNKNOWN_CLASS: &str = "Unknown Class";
pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";
pub const UNKNOWN_CHAPTER: &str = "Unknown Chapter";
pub const UNKNOWN_TEACHER: &str = "Unknown";
pub const NAME_NOT_SET: &str = "Name Not Set";
pub const NO_EMAIL: &str = "N/A";

pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Excellent,
    Good,
    Late,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent",
            Tier::Good => "Good",
            Tier::Late => "Late",
        }
    }
}

/// Punctuality tier for an attendance mark, evaluated against the hour and
/// minute of the mark itself. Any hour other than 7 classifies as Late,
/// including times before 07:00.
pub fn classify_mark(time: NaiveTime) -> (Tier, i64) {
    let hour = time.hour();
    let minute = time.minute();
    if hour == 7 && minute <= 40 {
        (Tier::Excellent, 3)
    } else if hour == 7 && minute <= 50 {
        (Tier::Good, 2)
    } else {
        (Tier::Late, 1)
    }
}

#[derive(Debug, Clone)]
pub struct ScoreError {
    pub code: String,
    pub message: String,
}

impl ScoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// A display reference resolved against the catalog. Lookups never fail the
/// surrounding computation; a missing row becomes `Unresolved` and renders as
/// a placeholder string at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefName {
    Known(String),
    Unresolved,
}

impl RefName {
    pub fn from_lookup(found: Option<String>) -> Self {
        match found {
            Some(name) => RefName::Known(name),
            None => RefName::Unresolved,
        }
    }

    pub fn display<'a>(&'a self, placeholder: &'a str) -> &'a str {
        match self {
            RefName::Known(name) => name,
            RefName::Unresolved => placeholder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeacherRow {
    pub id: String,
    pub code: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct EnrichedActivity {
    pub activity_name: String,
    pub points: i64,
    pub created_at: String,
    pub class_name: RefName,
    pub subject_name: RefName,
    pub chapter_name: RefName,
}

#[derive(Debug, Clone)]
pub struct TeacherScore {
    pub teacher: TeacherRow,
    pub attendance_score: i64,
    pub task_score: i64,
    pub total_score: i64,
    pub activity_count: usize,
    pub last_activity_at: Option<String>,
    pub activities: Vec<EnrichedActivity>,
}

/// Fold raw per-teacher inputs into derived scores. Teachers with no records
/// in either category score 0 for that component. `totalScore` is the sum of
/// the two components by construction.
pub fn compute_scores(
    teachers: Vec<TeacherRow>,
    attendance_totals: &HashMap<String, i64>,
    mut activities_by_teacher: HashMap<String, Vec<EnrichedActivity>>,
) -> Vec<TeacherScore> {
    teachers
        .into_iter()
        .map(|t| {
            let attendance_score = attendance_totals.get(&t.id).copied().unwrap_or(0);
            let activities = activities_by_teacher.remove(&t.id).unwrap_or_default();
            let task_score: i64 = activities.iter().map(|a| a.points).sum();
            // Activities are loaded newest-first, so the head is the latest.
            let last_activity_at = activities.first().map(|a| a.created_at.clone());
            TeacherScore {
                attendance_score,
                task_score,
                total_score: attendance_score + task_score,
                activity_count: activities.len(),
                last_activity_at,
                activities,
                teacher: t,
            }
        })
        .collect()
}

/// Order for the leaderboard: total score descending. The sort is stable, so
/// teachers with equal totals keep their directory order and end up with
/// distinct consecutive ranks (rank = position + 1). This is deliberately not
/// competition ranking.
pub fn sort_leaderboard(scores: &mut [TeacherScore]) {
    scores.sort_by(|a, b| b.total_score.cmp(&a.total_score));
}

/// Every teacher sharing the maximum total score. Unlike the leaderboard,
/// winners at the top are co-equal: [50, 90, 90, 30] yields both 90s.
pub fn top_teachers(scores: &[TeacherScore]) -> (i64, Vec<&TeacherScore>) {
    let Some(top_score) = scores.iter().map(|s| s.total_score).max() else {
        return (0, Vec::new());
    };
    let winners = scores
        .iter()
        .filter(|s| s.total_score == top_score)
        .collect();
    (top_score, winners)
}

fn load_teachers(conn: &Connection) -> Result<Vec<TeacherRow>, ScoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, teacher_code, full_name, email, status
             FROM teachers
             ORDER BY created_at, rowid",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    stmt.query_map([], |r| {
        Ok(TeacherRow {
            id: r.get(0)?,
            code: r.get(1)?,
            full_name: r.get(2)?,
            email: r.get(3)?,
            status: r.get(4)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))
}

fn load_attendance_totals(conn: &Connection) -> Result<HashMap<String, i64>, ScoreError> {
    let mut stmt = conn
        .prepare("SELECT teacher_id, SUM(points) FROM attendance GROUP BY teacher_id")
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))
        .and_then(|it| it.collect::<Result<HashMap<_, _>, _>>())
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))
}

fn load_enriched_activities(
    conn: &Connection,
) -> Result<HashMap<String, Vec<EnrichedActivity>>, ScoreError> {
    // LEFT JOINs realize the never-throwing reference resolvers: a dangling
    // class/subject/chapter id yields NULL, which becomes RefName::Unresolved.
    let mut stmt = conn
        .prepare(
            "SELECT a.teacher_id, a.activity_name, a.task_score, a.created_at,
                    c.name, s.name, ch.name
             FROM activities a
             LEFT JOIN classes c ON c.id = a.class_id
             LEFT JOIN subjects s ON s.id = a.subject_id
             LEFT JOIN chapters ch ON ch.id = a.chapter_id
             ORDER BY a.created_at DESC, a.rowid DESC",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    let rows = stmt
        .query_map([], |r| {
            let teacher_id: String = r.get(0)?;
            Ok((
                teacher_id,
                EnrichedActivity {
                    activity_name: r.get(1)?,
                    points: r.get(2)?,
                    created_at: r.get(3)?,
                    class_name: RefName::from_lookup(r.get(4)?),
                    subject_name: RefName::from_lookup(r.get(5)?),
                    chapter_name: RefName::from_lookup(r.get(6)?),
                },
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;

    let mut by_teacher: HashMap<String, Vec<EnrichedActivity>> = HashMap::new();
    for (teacher_id, activity) in rows {
        by_teacher.entry(teacher_id).or_default().push(activity);
    }
    Ok(by_teacher)
}

/// Derive every teacher's score from the current record sets. Always computed
/// fresh; nothing here is cached or incrementally maintained.
pub fn load_scores(conn: &Connection) -> Result<Vec<TeacherScore>, ScoreError> {
    let teachers = load_teachers(conn)?;
    let attendance_totals = load_attendance_totals(conn)?;
    let activities = load_enriched_activities(conn)?;
    Ok(compute_scores(teachers, &attendance_totals, activities))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(time: &str) -> NaiveTime {
        NaiveTime::parse_from_str(time, "%H:%M").expect("time literal")
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(classify_mark(t("07:40")), (Tier::Excellent, 3));
        assert_eq!(classify_mark(t("07:41")), (Tier::Good, 2));
        assert_eq!(classify_mark(t("07:50")), (Tier::Good, 2));
        assert_eq!(classify_mark(t("07:51")), (Tier::Late, 1));
        assert_eq!(classify_mark(t("08:00")), (Tier::Late, 1));
        assert_eq!(classify_mark(t("07:00")), (Tier::Excellent, 3));
    }

    #[test]
    fn early_arrival_is_still_late() {
        // Any hour other than 7 classifies as Late, even before 07:00.
        assert_eq!(classify_mark(t("06:30")), (Tier::Late, 1));
        assert_eq!(classify_mark(t("00:00")), (Tier::Late, 1));
    }

    fn teacher(id: &str) -> TeacherRow {
        TeacherRow {
            id: id.to_string(),
            code: format!("T-{}", id),
            full_name: Some(format!("Teacher {}", id)),
            email: Some(format!("{}@school.example", id)),
            status: "active".to_string(),
        }
    }

    fn activity(points: i64, created_at: &str) -> EnrichedActivity {
        EnrichedActivity {
            activity_name: "Quiz".to_string(),
            points,
            created_at: created_at.to_string(),
            class_name: RefName::Known("1A".to_string()),
            subject_name: RefName::Known("Math".to_string()),
            chapter_name: RefName::Unresolved,
        }
    }

    fn scores_with_totals(totals: &[(&str, i64)]) -> Vec<TeacherScore> {
        // Half the total from attendance, the rest from activities, so the
        // component invariant is exercised rather than trivially zero.
        let teachers: Vec<TeacherRow> = totals.iter().map(|(id, _)| teacher(id)).collect();
        let mut attendance = HashMap::new();
        let mut activities = HashMap::new();
        for (id, total) in totals {
            let task = (total / 2 / ACTIVITY_POINTS) * ACTIVITY_POINTS;
            attendance.insert(id.to_string(), total - task);
            let acts: Vec<EnrichedActivity> = (0..(task / ACTIVITY_POINTS))
                .map(|i| activity(ACTIVITY_POINTS, &format!("2026-01-01T10:{:02}:00", i)))
                .collect();
            activities.insert(id.to_string(), acts);
        }
        compute_scores(teachers, &attendance, activities)
    }

    #[test]
    fn total_is_sum_of_components() {
        let scores = scores_with_totals(&[("a", 50), ("b", 90), ("c", 90), ("d", 30)]);
        for s in &scores {
            assert_eq!(s.total_score, s.attendance_score + s.task_score);
            assert!(s.attendance_score >= 0);
            assert!(s.task_score >= 0);
        }
    }

    #[test]
    fn teacher_without_records_scores_zero() {
        let scores = compute_scores(vec![teacher("a")], &HashMap::new(), HashMap::new());
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].attendance_score, 0);
        assert_eq!(scores[0].task_score, 0);
        assert_eq!(scores[0].total_score, 0);
        assert_eq!(scores[0].activity_count, 0);
        assert!(scores[0].last_activity_at.is_none());
    }

    #[test]
    fn leaderboard_ties_get_distinct_sequential_ranks() {
        let mut scores = scores_with_totals(&[("a", 50), ("b", 90), ("c", 90), ("d", 30)]);
        sort_leaderboard(&mut scores);
        let totals: Vec<i64> = scores.iter().map(|s| s.total_score).collect();
        assert_eq!(totals, vec![90, 90, 50, 30]);
        // Stable sort: the tied 90s keep directory order.
        assert_eq!(scores[0].teacher.id, "b");
        assert_eq!(scores[1].teacher.id, "c");
        let ranks: Vec<usize> = (0..scores.len()).map(|i| i + 1).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn best_teacher_tie_returns_all_winners() {
        let scores = scores_with_totals(&[("a", 50), ("b", 90), ("c", 90), ("d", 30)]);
        let (top_score, winners) = top_teachers(&scores);
        assert_eq!(top_score, 90);
        let ids: Vec<&str> = winners.iter().map(|s| s.teacher.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn best_teacher_on_empty_set() {
        let (top_score, winners) = top_teachers(&[]);
        assert_eq!(top_score, 0);
        assert!(winners.is_empty());
    }

    #[test]
    fn last_activity_is_newest() {
        let mut activities = HashMap::new();
        activities.insert(
            "a".to_string(),
            vec![
                activity(2, "2026-02-03T09:00:00"),
                activity(2, "2026-02-01T09:00:00"),
            ],
        );
        let scores = compute_scores(vec![teacher("a")], &HashMap::new(), activities);
        assert_eq!(
            scores[0].last_activity_at.as_deref(),
            Some("2026-02-03T09:00:00")
        );
        assert_eq!(scores[0].task_score, 4);
        assert_eq!(scores[0].activity_count, 2);
    }
}
