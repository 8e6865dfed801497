use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_i64, parse_opt_string, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{
    ScheduleEntryInput, ScheduleError, SchedulePatch, ScheduleStore, SessionType,
};
use crate::timeslot::parse_hhmm;
use serde_json::json;

fn store_err(id: &str, e: ScheduleError) -> serde_json::Value {
    match e {
        ScheduleError::Conflict {
            room,
            day,
            start,
            end,
        } => err(
            id,
            "conflict",
            "time slot conflict detected for this room",
            Some(json!({
                "roomNumber": room,
                "dayOfWeek": day,
                "startTime": start,
                "endTime": end,
            })),
        ),
        ScheduleError::NotFound(session_id) => err(
            id,
            "not_found",
            "schedule session not found",
            Some(json!({ "id": session_id })),
        ),
        ScheduleError::Storage(e) => err(id, "db_query_failed", e.to_string(), None),
    }
}

fn parse_day(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    let day = required_i64(req, key)?;
    if !(1..=5).contains(&day) {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be between 1 and 5", key),
            None,
        ));
    }
    Ok(day)
}

fn parse_time(req: &Request, key: &str) -> Result<u32, serde_json::Value> {
    let raw = required_str(req, key)?;
    parse_hhmm(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be HH:MM", key),
            None,
        )
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match ScheduleStore::new(conn).get_all() {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => store_err(&req.id, e),
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
    match ScheduleStore::new(conn).get_by_id(id) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => store_err(&req.id, e),
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
    match ScheduleStore::new(conn).get_by_course(course_id) {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_list_by_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let day = match parse_day(req, "dayOfWeek") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ScheduleStore::new(conn).get_by_day(day) {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let input: ScheduleEntryInput = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    match ScheduleStore::new(conn).create(input) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => store_err(&req.id, e),
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

    let mut patch = SchedulePatch::default();
    patch.course_id = match parse_opt_i64(req.params.get("courseId")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("courseId {}", msg), None),
    };
    patch.room_number = match parse_opt_string(req.params.get("roomNumber")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("roomNumber {}", msg), None),
    };
    match parse_opt_string(req.params.get("sessionType")) {
        Ok(None) => {}
        Ok(Some(raw)) => match SessionType::parse(&raw) {
            Some(t) => patch.session_type = Some(t),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown sessionType: {}", raw),
                    None,
                )
            }
        },
        Err(msg) => return err(&req.id, "bad_params", format!("sessionType {}", msg), None),
    }
    match parse_opt_i64(req.params.get("dayOfWeek")) {
        Ok(None) => {}
        Ok(Some(day)) if (1..=5).contains(&day) => patch.day_of_week = Some(day),
        Ok(Some(_)) => {
            return err(
                &req.id,
                "bad_params",
                "dayOfWeek must be between 1 and 5",
                None,
            )
        }
        Err(msg) => return err(&req.id, "bad_params", format!("dayOfWeek {}", msg), None),
    }
    match parse_opt_string(req.params.get("startTime")) {
        Ok(None) => {}
        Ok(Some(raw)) => match parse_hhmm(&raw) {
            Some(min) => patch.start_min = Some(min),
            None => return err(&req.id, "bad_params", "startTime must be HH:MM", None),
        },
        Err(msg) => return err(&req.id, "bad_params", format!("startTime {}", msg), None),
    }
    match parse_opt_string(req.params.get("endTime")) {
        Ok(None) => {}
        Ok(Some(raw)) => match parse_hhmm(&raw) {
            Some(min) => patch.end_min = Some(min),
            None => return err(&req.id, "bad_params", "endTime must be HH:MM", None),
        },
        Err(msg) => return err(&req.id, "bad_params", format!("endTime {}", msg), None),
    }

    match ScheduleStore::new(conn).update(id, patch) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => store_err(&req.id, e),
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
    match ScheduleStore::new(conn).delete(id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_update_time_slot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let day = match parse_day(req, "dayOfWeek") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let start_min = match parse_time(req, "startTime") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ScheduleStore::new(conn).update_time_slot(id, day, start_min) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.list" => Some(handle_list(state, req)),
        "schedule.get" => Some(handle_get(state, req)),
        "schedule.listByCourse" => Some(handle_list_by_course(state, req)),
        "schedule.listByDay" => Some(handle_list_by_day(state, req)),
        "schedule.create" => Some(handle_create(state, req)),
        "schedule.update" => Some(handle_update(state, req)),
        "schedule.delete" => Some(handle_delete(state, req)),
        "schedule.updateTimeSlot" => Some(handle_update_time_slot(state, req)),
        _ => None,
    }
}
