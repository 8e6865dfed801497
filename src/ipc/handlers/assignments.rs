use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, parse_opt_bool, parse_opt_f64, parse_opt_i64, parse_opt_string, required_f64,
    required_i64, required_str,
};
use crate::ipc::types::{AppState, Request};
use chrono::{Duration, Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn assignment_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, i64>(0)?,
        "courseId": r.get::<_, i64>(1)?,
        "title": r.get::<_, String>(2)?,
        "category": r.get::<_, Option<String>>(3)?,
        "dueDate": r.get::<_, Option<String>>(4)?,
        "score": r.get::<_, Option<f64>>(5)?,
        "maxScore": r.get::<_, f64>(6)?,
        "completed": r.get::<_, i64>(7)? != 0,
        "priority": r.get::<_, Option<String>>(8)?,
    }))
}

const SELECT_COLS: &str =
    "id, course_id, title, category, due_date, score, max_score, completed, priority";

fn get_assignment(conn: &Connection, id: i64) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(
        &format!("SELECT {} FROM assignments WHERE id = ?", SELECT_COLS),
        [id],
        assignment_json,
    )
    .optional()
}

fn parse_due_date(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    let raw = parse_opt_string(req.params.get(key))
        .map_err(|msg| err(&req.id, "bad_params", format!("{} {}", key, msg), None))?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if NaiveDate::parse_from_str(&raw, "%Y-%m-%d").is_err() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be YYYY-MM-DD", key),
            None,
        ));
    }
    Ok(Some(raw))
}

/// Reference date for the upcoming/overdue windows. Tests pass an explicit
/// `today`; the UI omits it and gets the local date.
fn reference_date(req: &Request) -> Result<NaiveDate, serde_json::Value> {
    match parse_opt_string(req.params.get("today"))
        .map_err(|msg| err(&req.id, "bad_params", format!("today {}", msg), None))?
    {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| err(&req.id, "bad_params", "today must be YYYY-MM-DD", None)),
        None => Ok(Local::now().date_naive()),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "assignments": [] }));
    };
    let mut stmt = match conn.prepare(&format!(
        "SELECT {} FROM assignments ORDER BY id",
        SELECT_COLS
    )) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], assignment_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_list_by_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_i64(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(&format!(
        "SELECT {} FROM assignments WHERE course_id = ? ORDER BY id",
        SELECT_COLS
    )) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([course_id], assignment_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_i64(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let max_score = match required_f64(req, "maxScore") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let category = match parse_opt_string(req.params.get("category")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("category {}", msg), None),
    };
    let due_date = match parse_due_date(req, "dueDate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let priority = match parse_opt_string(req.params.get("priority")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("priority {}", msg), None),
    };

    let next_id: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(id), 0) + 1 FROM assignments",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // New assignments always start ungraded and not completed.
    if let Err(e) = conn.execute(
        "INSERT INTO assignments(id, course_id, title, category, due_date, score, max_score, completed, priority)
         VALUES(?, ?, ?, ?, ?, NULL, ?, 0, ?)",
        (next_id, course_id, &title, &category, &due_date, max_score, &priority),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }

    match get_assignment(conn, next_id) {
        Ok(Some(assignment)) => ok(&req.id, json!({ "assignment": assignment })),
        Ok(None) => err(&req.id, "not_found", "assignment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match get_assignment(conn, id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "assignment not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let title = match parse_opt_string(req.params.get("title")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("title {}", msg), None),
    };
    let category = match parse_opt_string(req.params.get("category")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("category {}", msg), None),
    };
    let due_date = match parse_due_date(req, "dueDate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Tri-state: absent key keeps the score, explicit null un-grades the
    // assignment, a number sets it.
    let score_update: Option<Option<f64>> = match req.params.get("score") {
        None => None,
        Some(v) if v.is_null() => Some(None),
        Some(v) => match v.as_f64() {
            Some(f) => Some(Some(f)),
            None => return err(&req.id, "bad_params", "score must be number or null", None),
        },
    };
    let max_score = match parse_opt_f64(req.params.get("maxScore")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("maxScore {}", msg), None),
    };
    let completed = match parse_opt_bool(req.params.get("completed")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("completed {}", msg), None),
    };
    let priority = match parse_opt_string(req.params.get("priority")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("priority {}", msg), None),
    };
    let course_id = match parse_opt_i64(req.params.get("courseId")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("courseId {}", msg), None),
    };

    if let Err(e) = conn.execute(
        "UPDATE assignments SET
           course_id = COALESCE(?, course_id),
           title = COALESCE(?, title),
           category = COALESCE(?, category),
           due_date = COALESCE(?, due_date),
           score = CASE WHEN ? THEN ? ELSE score END,
           max_score = COALESCE(?, max_score),
           completed = COALESCE(?, completed),
           priority = COALESCE(?, priority)
         WHERE id = ?",
        (
            course_id,
            &title,
            &category,
            &due_date,
            score_update.is_some(),
            score_update.flatten(),
            max_score,
            completed.map(|b| b as i64),
            &priority,
            id,
        ),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    match get_assignment(conn, id) {
        Ok(Some(assignment)) => ok(&req.id, json!({ "assignment": assignment })),
        Ok(None) => err(&req.id, "not_found", "assignment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match get_assignment(conn, id) {
        Ok(Some(assignment)) => {
            if let Err(e) = conn.execute("DELETE FROM assignments WHERE id = ?", [id]) {
                return err(&req.id, "db_delete_failed", e.to_string(), None);
            }
            ok(&req.id, json!({ "assignment": assignment }))
        }
        Ok(None) => err(&req.id, "not_found", "assignment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_toggle_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match conn.execute(
        "UPDATE assignments SET completed = 1 - completed WHERE id = ?",
        [id],
    ) {
        Ok(0) => return err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => {}
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    }
    match get_assignment(conn, id) {
        Ok(Some(assignment)) => ok(&req.id, json!({ "assignment": assignment })),
        Ok(None) => err(&req.id, "not_found", "assignment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_upcoming(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let days = match parse_opt_i64(req.params.get("days")) {
        Ok(v) => v.unwrap_or(7),
        Err(msg) => return err(&req.id, "bad_params", format!("days {}", msg), None),
    };
    let today = match reference_date(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let horizon = today + Duration::days(days);

    let mut stmt = match conn.prepare(&format!(
        "SELECT {} FROM assignments
         WHERE completed = 0 AND due_date IS NOT NULL AND due_date >= ? AND due_date <= ?
         ORDER BY due_date",
        SELECT_COLS
    )) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(
            [today.format("%Y-%m-%d").to_string(), horizon.format("%Y-%m-%d").to_string()],
            assignment_json,
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_overdue(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let today = match reference_date(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut stmt = match conn.prepare(&format!(
        "SELECT {} FROM assignments
         WHERE completed = 0 AND due_date IS NOT NULL AND due_date < ?
         ORDER BY due_date",
        SELECT_COLS
    )) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([today.format("%Y-%m-%d").to_string()], assignment_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_list(state, req)),
        "assignments.listByCourse" => Some(handle_list_by_course(state, req)),
        "assignments.create" => Some(handle_create(state, req)),
        "assignments.update" => Some(handle_update(state, req)),
        "assignments.delete" => Some(handle_delete(state, req)),
        "assignments.toggleComplete" => Some(handle_toggle_complete(state, req)),
        "assignments.upcoming" => Some(handle_upcoming(state, req)),
        "assignments.overdue" => Some(handle_overdue(state, req)),
        _ => None,
    }
}
