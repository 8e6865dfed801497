use crate::calc::{self, AssignmentRecord, Course, GradeCategory};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_f64, required_i64};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn load_categories(conn: &Connection, course_id: Option<i64>) -> rusqlite::Result<Vec<GradeCategory>> {
    let (sql, params): (&str, Vec<i64>) = match course_id {
        Some(id) => (
            "SELECT course_id, name, weight FROM grade_categories WHERE course_id = ? ORDER BY name",
            vec![id],
        ),
        None => (
            "SELECT course_id, name, weight FROM grade_categories ORDER BY course_id, name",
            vec![],
        ),
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params), |r| {
        Ok(GradeCategory {
            course_id: r.get(0)?,
            name: r.get(1)?,
            weight: r.get(2)?,
        })
    })?;
    rows.collect()
}

fn load_assignments(conn: &Connection) -> rusqlite::Result<Vec<AssignmentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, category, score, max_score, completed FROM assignments ORDER BY id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(AssignmentRecord {
            id: r.get(0)?,
            course_id: r.get(1)?,
            category: r.get(2)?,
            score: r.get(3)?,
            max_score: r.get(4)?,
            completed: r.get::<_, i64>(5)? != 0,
        })
    })?;
    rows.collect()
}

fn load_courses(conn: &Connection) -> rusqlite::Result<Vec<Course>> {
    let mut stmt = conn.prepare("SELECT id, credits FROM courses ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(Course {
            id: r.get(0)?,
            credits: r.get(1)?,
        })
    })?;
    rows.collect()
}

/// The UI may pass the assignment collection it already holds; otherwise the
/// workspace store is read.
fn assignments_for(conn: &Connection, req: &Request) -> Result<Vec<AssignmentRecord>, serde_json::Value> {
    match req.params.get("assignments") {
        None => load_assignments(conn)
            .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None)),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| err(&req.id, "bad_params", format!("assignments {}", e), None)),
    }
}

fn handle_categories_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_i64(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match load_categories(conn, Some(course_id)) {
        Ok(categories) => ok(&req.id, json!({ "categories": categories })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_categories_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_i64(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("categories").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing categories array", None);
    };

    let mut parsed: Vec<(String, f64)> = Vec::with_capacity(raw.len());
    for item in raw {
        let name = item
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let weight = item.get("weight").and_then(|v| v.as_f64());
        let (Some(name), Some(weight)) = (name, weight) else {
            return err(
                &req.id,
                "bad_params",
                "each category needs name and weight",
                None,
            );
        };
        parsed.push((name, weight));
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "DELETE FROM grade_categories WHERE course_id = ?",
        [course_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    for (name, weight) in &parsed {
        if let Err(e) = tx.execute(
            "INSERT INTO grade_categories(course_id, name, weight) VALUES(?, ?, ?)",
            (course_id, name, weight),
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match load_categories(conn, Some(course_id)) {
        Ok(categories) => ok(&req.id, json!({ "categories": categories })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_course_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_i64(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let categories = match load_categories(conn, Some(course_id)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let assignments = match assignments_for(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let percentage = calc::course_grade(course_id, &categories, &assignments);
    ok(
        &req.id,
        json!({
            "courseId": course_id,
            "percentage": percentage,
            "letter": calc::letter_grade(percentage),
            "gradePoints": calc::grade_to_points(percentage),
        }),
    )
}

fn handle_letter_grade(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let percentage = match required_f64(req, "percentage") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({
            "percentage": percentage,
            "letter": calc::letter_grade(percentage),
            "gradePoints": calc::grade_to_points(percentage),
        }),
    )
}

fn handle_overall_gpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let courses = match load_courses(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let categories = match load_categories(conn, None) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let assignments = match assignments_for(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let gpa = calc::overall_gpa(&courses, &categories, &assignments);
    let mut total_credits = 0_i64;
    let per_course: Vec<serde_json::Value> = courses
        .iter()
        .map(|c| {
            let percentage = calc::course_grade(c.id, &categories, &assignments);
            let included = percentage > 0.0;
            if included {
                total_credits += c.credits;
            }
            json!({
                "courseId": c.id,
                "credits": c.credits,
                "percentage": percentage,
                "letter": calc::letter_grade(percentage),
                "gradePoints": calc::grade_to_points(percentage),
                "included": included,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "gpa": gpa,
            "totalCredits": total_credits,
            "perCourse": per_course,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.categories.list" => Some(handle_categories_list(state, req)),
        "grades.categories.set" => Some(handle_categories_set(state, req)),
        "grades.courseGrade" => Some(handle_course_grade(state, req)),
        "grades.letterGrade" => Some(handle_letter_grade(state, req)),
        "grades.overallGPA" => Some(handle_overall_gpa(state, req)),
        _ => None,
    }
}
