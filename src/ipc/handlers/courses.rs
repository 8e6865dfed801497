use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, parse_opt_i64, parse_opt_string, required_i64, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn course_json(conn: &Connection, id: i64) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(
        "SELECT
           c.id, c.name, c.code, c.instructor, c.credits, c.color,
           (SELECT COUNT(*) FROM assignments a WHERE a.course_id = c.id) AS assignment_count,
           (SELECT COUNT(*) FROM schedule_sessions s WHERE s.course_id = c.id) AS session_count
         FROM courses c
         WHERE c.id = ?",
        [id],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "name": r.get::<_, String>(1)?,
                "code": r.get::<_, Option<String>>(2)?,
                "instructor": r.get::<_, Option<String>>(3)?,
                "credits": r.get::<_, i64>(4)?,
                "color": r.get::<_, Option<String>>(5)?,
                "assignmentCount": r.get::<_, i64>(6)?,
                "sessionCount": r.get::<_, i64>(7)?,
            }))
        },
    )
    .optional()
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT
           c.id, c.name, c.code, c.instructor, c.credits, c.color,
           (SELECT COUNT(*) FROM assignments a WHERE a.course_id = c.id) AS assignment_count,
           (SELECT COUNT(*) FROM schedule_sessions s WHERE s.course_id = c.id) AS session_count
         FROM courses c
         ORDER BY c.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "name": r.get::<_, String>(1)?,
                "code": r.get::<_, Option<String>>(2)?,
                "instructor": r.get::<_, Option<String>>(3)?,
                "credits": r.get::<_, i64>(4)?,
                "color": r.get::<_, Option<String>>(5)?,
                "assignmentCount": r.get::<_, i64>(6)?,
                "sessionCount": r.get::<_, i64>(7)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let credits = match required_i64(req, "credits") {
        Ok(v) if v > 0 => v,
        Ok(_) => return err(&req.id, "bad_params", "credits must be positive", None),
        Err(resp) => return resp,
    };
    let code = match parse_opt_string(req.params.get("code")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("code {}", msg), None),
    };
    let instructor = match parse_opt_string(req.params.get("instructor")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("instructor {}", msg), None),
    };
    let color = match parse_opt_string(req.params.get("color")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("color {}", msg), None),
    };

    // Optional category weight table, e.g. { "exam": 60, "homework": 40 }.
    let mut weights: Vec<(String, f64)> = Vec::new();
    if let Some(raw) = req.params.get("gradeWeight") {
        let Some(obj) = raw.as_object() else {
            return err(&req.id, "bad_params", "gradeWeight must be an object", None);
        };
        for (cat, w) in obj {
            let Some(w) = w.as_f64() else {
                return err(
                    &req.id,
                    "bad_params",
                    "gradeWeight values must be numbers",
                    None,
                );
            };
            weights.push((cat.clone(), w));
        }
    }

    let next_id: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(id), 0) + 1 FROM courses",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "INSERT INTO courses(id, name, code, instructor, credits, color) VALUES(?, ?, ?, ?, ?, ?)",
        (next_id, &name, &code, &instructor, credits, &color),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }
    for (cat, w) in &weights {
        if let Err(e) = tx.execute(
            "INSERT INTO grade_categories(course_id, name, weight) VALUES(?, ?, ?)",
            (next_id, cat, w),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "grade_categories" })),
            );
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match course_json(conn, next_id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => err(&req.id, "not_found", "course not found", None),
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

    let existing = match course_json(conn, id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing.is_none() {
        return err(&req.id, "not_found", "course not found", None);
    }

    let name = match parse_opt_string(req.params.get("name")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("name {}", msg), None),
    };
    let credits = match parse_opt_i64(req.params.get("credits")) {
        Ok(Some(v)) if v <= 0 => {
            return err(&req.id, "bad_params", "credits must be positive", None)
        }
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("credits {}", msg), None),
    };
    let code = match parse_opt_string(req.params.get("code")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("code {}", msg), None),
    };
    let instructor = match parse_opt_string(req.params.get("instructor")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("instructor {}", msg), None),
    };
    let color = match parse_opt_string(req.params.get("color")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("color {}", msg), None),
    };

    if let Err(e) = conn.execute(
        "UPDATE courses SET
           name = COALESCE(?, name),
           credits = COALESCE(?, credits),
           code = COALESCE(?, code),
           instructor = COALESCE(?, instructor),
           color = COALESCE(?, color)
         WHERE id = ?",
        (&name, credits, &code, &instructor, &color, id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    match course_json(conn, id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => err(&req.id, "not_found", "course not found", None),
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

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "course not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    // The weight table is owned by the course; assignments and sessions keep
    // their rows (matching the source app, which leaves them orphaned).
    if let Err(e) = tx.execute("DELETE FROM grade_categories WHERE course_id = ?", [id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "grade_categories" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM courses WHERE id = ?", [id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_list(state, req)),
        "courses.create" => Some(handle_create(state, req)),
        "courses.update" => Some(handle_update(state, req)),
        "courses.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
