use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, parse_opt_f64, parse_opt_string, required_i64, required_str,
};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn student_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, i64>(0)?,
        "firstName": r.get::<_, String>(1)?,
        "lastName": r.get::<_, String>(2)?,
        "email": r.get::<_, String>(3)?,
        "studentId": r.get::<_, String>(4)?,
        "major": r.get::<_, Option<String>>(5)?,
        "year": r.get::<_, Option<String>>(6)?,
        "gpa": r.get::<_, f64>(7)?,
        "enrollmentDate": r.get::<_, Option<String>>(8)?,
        "phoneNumber": r.get::<_, String>(9)?,
        "status": r.get::<_, String>(10)?,
    }))
}

const SELECT_COLS: &str = "id, first_name, last_name, email, student_no, major, year, gpa, \
                           enrollment_date, phone_number, status";

fn get_student(conn: &Connection, id: i64) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", SELECT_COLS),
        [id],
        student_json,
    )
    .optional()
}

fn parse_enrollment_date(req: &Request) -> Result<Option<String>, serde_json::Value> {
    let raw = parse_opt_string(req.params.get("enrollmentDate"))
        .map_err(|msg| err(&req.id, "bad_params", format!("enrollmentDate {}", msg), None))?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if NaiveDate::parse_from_str(&raw, "%Y-%m-%d").is_err() {
        return Err(err(
            &req.id,
            "bad_params",
            "enrollmentDate must be YYYY-MM-DD",
            None,
        ));
    }
    Ok(Some(raw))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let mut stmt = match conn.prepare(&format!(
        "SELECT {} FROM students ORDER BY last_name, first_name",
        SELECT_COLS
    )) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], student_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match get_student(conn, id) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_no = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let major = match parse_opt_string(req.params.get("major")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("major {}", msg), None),
    };
    let year = match parse_opt_string(req.params.get("year")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("year {}", msg), None),
    };
    let gpa = match parse_opt_f64(req.params.get("gpa")) {
        Ok(v) => v.unwrap_or(0.0),
        Err(msg) => return err(&req.id, "bad_params", format!("gpa {}", msg), None),
    };
    let enrollment_date = match parse_enrollment_date(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let phone_number = match parse_opt_string(req.params.get("phoneNumber")) {
        Ok(v) => v.unwrap_or_default(),
        Err(msg) => return err(&req.id, "bad_params", format!("phoneNumber {}", msg), None),
    };
    let status = match parse_opt_string(req.params.get("status")) {
        Ok(v) => v.unwrap_or_else(|| "Active".to_string()),
        Err(msg) => return err(&req.id, "bad_params", format!("status {}", msg), None),
    };

    let next_id: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(id), 0) + 1 FROM students",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    if let Err(e) = conn.execute(
        "INSERT INTO students(id, first_name, last_name, email, student_no, major, year, gpa, enrollment_date, phone_number, status)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            next_id,
            &first_name,
            &last_name,
            &email,
            &student_no,
            &major,
            &year,
            gpa,
            &enrollment_date,
            &phone_number,
            &status,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    match get_student(conn, next_id) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
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
    match get_student(conn, id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let first_name = match parse_opt_string(req.params.get("firstName")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("firstName {}", msg), None),
    };
    let last_name = match parse_opt_string(req.params.get("lastName")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("lastName {}", msg), None),
    };
    let email = match parse_opt_string(req.params.get("email")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("email {}", msg), None),
    };
    let student_no = match parse_opt_string(req.params.get("studentId")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("studentId {}", msg), None),
    };
    let major = match parse_opt_string(req.params.get("major")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("major {}", msg), None),
    };
    let year = match parse_opt_string(req.params.get("year")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("year {}", msg), None),
    };
    let gpa = match parse_opt_f64(req.params.get("gpa")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("gpa {}", msg), None),
    };
    let enrollment_date = match parse_enrollment_date(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let phone_number = match parse_opt_string(req.params.get("phoneNumber")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("phoneNumber {}", msg), None),
    };
    let status = match parse_opt_string(req.params.get("status")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("status {}", msg), None),
    };

    // The row id is immutable; the roster number (student_no) is editable.
    if let Err(e) = conn.execute(
        "UPDATE students SET
           first_name = COALESCE(?, first_name),
           last_name = COALESCE(?, last_name),
           email = COALESCE(?, email),
           student_no = COALESCE(?, student_no),
           major = COALESCE(?, major),
           year = COALESCE(?, year),
           gpa = COALESCE(?, gpa),
           enrollment_date = COALESCE(?, enrollment_date),
           phone_number = COALESCE(?, phone_number),
           status = COALESCE(?, status)
         WHERE id = ?",
        (
            &first_name,
            &last_name,
            &email,
            &student_no,
            &major,
            &year,
            gpa,
            &enrollment_date,
            &phone_number,
            &status,
            id,
        ),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    match get_student(conn, id) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
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
    match get_student(conn, id) {
        Ok(Some(student)) => {
            if let Err(e) = conn.execute("DELETE FROM students WHERE id = ?", [id]) {
                return err(&req.id, "db_delete_failed", e.to_string(), None);
            }
            ok(&req.id, json!({ "student": student }))
        }
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "students.create" => Some(handle_create(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
