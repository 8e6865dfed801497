use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeslot::{add_minutes, format_hhmm, TimeInterval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Lecture,
    Lab,
    Tutorial,
    Seminar,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Lecture => "Lecture",
            SessionType::Lab => "Lab",
            SessionType::Tutorial => "Tutorial",
            SessionType::Seminar => "Seminar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Lecture" => Some(SessionType::Lecture),
            "Lab" => Some(SessionType::Lab),
            "Tutorial" => Some(SessionType::Tutorial),
            "Seminar" => Some(SessionType::Seminar),
            _ => None,
        }
    }
}

/// One committed class session. Callers get owned copies; only the store
/// mutates the underlying rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: i64,
    pub course_id: i64,
    pub room_number: String,
    pub session_type: SessionType,
    #[serde(flatten)]
    pub interval: TimeInterval,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntryInput {
    pub course_id: i64,
    pub room_number: String,
    pub session_type: SessionType,
    #[serde(flatten)]
    pub interval: TimeInterval,
}

/// Partial update; absent fields keep the existing value. The id itself is
/// immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulePatch {
    pub course_id: Option<i64>,
    pub room_number: Option<String>,
    pub session_type: Option<SessionType>,
    pub day_of_week: Option<i64>,
    pub start_min: Option<u32>,
    pub end_min: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("time slot conflict detected for room {room} on day {day} ({start}-{end})")]
    Conflict {
        room: String,
        day: i64,
        start: String,
        end: String,
    },
    #[error("schedule session not found: {0}")]
    NotFound(i64),
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// Pure conflict check: same room, same day, half-open ranges overlapping.
/// `exclude_id` drops an entry's own row when revalidating an update.
pub fn find_conflict<'e>(
    candidate: &TimeInterval,
    room: &str,
    existing: &'e [ScheduleEntry],
    exclude_id: Option<i64>,
) -> Option<&'e ScheduleEntry> {
    existing.iter().find(|e| {
        Some(e.id) != exclude_id && e.room_number == room && e.interval.overlaps(candidate)
    })
}

/// The authoritative schedule collection, backed by the workspace database.
/// Every mutation is validate-then-commit: a rejected conflict check writes
/// nothing.
pub struct ScheduleStore<'a> {
    conn: &'a Connection,
}

impl<'a> ScheduleStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get_all(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        self.query_entries("SELECT id, course_id, room_number, session_type, day_of_week, start_min, end_min FROM schedule_sessions ORDER BY id", [])
    }

    pub fn get_by_id(&self, id: i64) -> Result<ScheduleEntry, ScheduleError> {
        let rows = self.query_entries(
            "SELECT id, course_id, room_number, session_type, day_of_week, start_min, end_min FROM schedule_sessions WHERE id = ?",
            [id],
        )?;
        rows.into_iter().next().ok_or(ScheduleError::NotFound(id))
    }

    pub fn get_by_course(&self, course_id: i64) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        self.query_entries(
            "SELECT id, course_id, room_number, session_type, day_of_week, start_min, end_min FROM schedule_sessions WHERE course_id = ? ORDER BY id",
            [course_id],
        )
    }

    pub fn get_by_day(&self, day_of_week: i64) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        self.query_entries(
            "SELECT id, course_id, room_number, session_type, day_of_week, start_min, end_min FROM schedule_sessions WHERE day_of_week = ? ORDER BY start_min",
            [day_of_week],
        )
    }

    pub fn create(&self, input: ScheduleEntryInput) -> Result<ScheduleEntry, ScheduleError> {
        let existing = self.get_all()?;
        if find_conflict(&input.interval, &input.room_number, &existing, None).is_some() {
            return Err(conflict_error(&input.room_number, &input.interval));
        }

        let next_id = existing.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let entry = ScheduleEntry {
            id: next_id,
            course_id: input.course_id,
            room_number: input.room_number,
            session_type: input.session_type,
            interval: input.interval,
        };
        self.insert(&entry)?;
        Ok(entry)
    }

    pub fn update(&self, id: i64, patch: SchedulePatch) -> Result<ScheduleEntry, ScheduleError> {
        let existing = self.get_all()?;
        let current = existing
            .iter()
            .find(|e| e.id == id)
            .ok_or(ScheduleError::NotFound(id))?;

        let merged = ScheduleEntry {
            id,
            course_id: patch.course_id.unwrap_or(current.course_id),
            room_number: patch
                .room_number
                .unwrap_or_else(|| current.room_number.clone()),
            session_type: patch.session_type.unwrap_or(current.session_type),
            interval: TimeInterval {
                day_of_week: patch.day_of_week.unwrap_or(current.interval.day_of_week),
                start_min: patch.start_min.unwrap_or(current.interval.start_min),
                end_min: patch.end_min.unwrap_or(current.interval.end_min),
            },
        };

        if find_conflict(&merged.interval, &merged.room_number, &existing, Some(id)).is_some() {
            return Err(conflict_error(&merged.room_number, &merged.interval));
        }

        self.conn.execute(
            "UPDATE schedule_sessions
             SET course_id = ?, room_number = ?, session_type = ?, day_of_week = ?, start_min = ?, end_min = ?
             WHERE id = ?",
            (
                merged.course_id,
                &merged.room_number,
                merged.session_type.as_str(),
                merged.interval.day_of_week,
                merged.interval.start_min,
                merged.interval.end_min,
                id,
            ),
        )?;
        Ok(merged)
    }

    pub fn delete(&self, id: i64) -> Result<(), ScheduleError> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM schedule_sessions WHERE id = ?", [id], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(ScheduleError::NotFound(id));
        }
        self.conn
            .execute("DELETE FROM schedule_sessions WHERE id = ?", [id])?;
        Ok(())
    }

    /// Drag-and-drop reschedule: move a session to a new day/start while
    /// keeping its current duration. Minute arithmetic only; a move ending
    /// past midnight keeps counting hours upward.
    pub fn update_time_slot(
        &self,
        id: i64,
        new_day: i64,
        new_start_min: u32,
    ) -> Result<ScheduleEntry, ScheduleError> {
        let current = self.get_by_id(id)?;
        let duration = current.interval.duration_min();
        let new_end_min = add_minutes(new_start_min, duration);
        self.update(
            id,
            SchedulePatch {
                day_of_week: Some(new_day),
                start_min: Some(new_start_min),
                end_min: Some(new_end_min),
                ..SchedulePatch::default()
            },
        )
    }

    fn insert(&self, entry: &ScheduleEntry) -> Result<(), ScheduleError> {
        self.conn.execute(
            "INSERT INTO schedule_sessions(id, course_id, room_number, session_type, day_of_week, start_min, end_min)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                entry.id,
                entry.course_id,
                &entry.room_number,
                entry.session_type.as_str(),
                entry.interval.day_of_week,
                entry.interval.start_min,
                entry.interval.end_min,
            ),
        )?;
        Ok(())
    }

    fn query_entries<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |r| {
            let session_type_raw: String = r.get(3)?;
            let session_type = SessionType::parse(&session_type_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown session type: {session_type_raw}").into(),
                )
            })?;
            Ok(ScheduleEntry {
                id: r.get(0)?,
                course_id: r.get(1)?,
                room_number: r.get(2)?,
                session_type,
                interval: TimeInterval {
                    day_of_week: r.get(4)?,
                    start_min: r.get(5)?,
                    end_min: r.get(6)?,
                },
            })
        })?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn conflict_error(room: &str, interval: &TimeInterval) -> ScheduleError {
    ScheduleError::Conflict {
        room: room.to_string(),
        day: interval.day_of_week,
        start: format_hhmm(interval.start_min),
        end: format_hhmm(interval.end_min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::timeslot::parse_hhmm;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::init_schema(&conn).expect("init schema");
        conn
    }

    fn input(course_id: i64, room: &str, day: i64, start: &str, end: &str) -> ScheduleEntryInput {
        ScheduleEntryInput {
            course_id,
            room_number: room.to_string(),
            session_type: SessionType::Lecture,
            interval: TimeInterval {
                day_of_week: day,
                start_min: parse_hhmm(start).expect("start"),
                end_min: parse_hhmm(end).expect("end"),
            },
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        let a = store.create(input(1, "101", 1, "09:00", "10:00")).expect("a");
        let b = store.create(input(1, "102", 1, "09:00", "10:00")).expect("b");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        store.delete(b.id).expect("delete b");
        let c = store.create(input(1, "103", 1, "09:00", "10:00")).expect("c");
        // max(existing) + 1, not a persistent counter.
        assert_eq!(c.id, 2);
    }

    #[test]
    fn overlapping_same_room_same_day_is_rejected() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");

        let err = store
            .create(input(2, "101", 1, "09:30", "10:30"))
            .expect_err("overlap must be rejected");
        match err {
            ScheduleError::Conflict { room, day, .. } => {
                assert_eq!(room, "101");
                assert_eq!(day, 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn rejected_create_leaves_store_unchanged() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");
        let before = store.get_all().expect("before");

        let _ = store
            .create(input(2, "101", 1, "09:30", "10:30"))
            .expect_err("conflict");
        assert_eq!(store.get_all().expect("after"), before);
    }

    #[test]
    fn touching_boundaries_do_not_conflict() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");
        store
            .create(input(2, "101", 1, "10:00", "11:00"))
            .expect("back-to-back slot must be allowed");
    }

    #[test]
    fn other_room_or_day_never_conflicts() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");
        store
            .create(input(2, "202", 1, "09:00", "10:00"))
            .expect("other room");
        store
            .create(input(3, "101", 2, "09:00", "10:00"))
            .expect("other day");
    }

    #[test]
    fn update_excludes_own_entry_from_conflict_check() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        let entry = store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");

        // Re-asserting the identical slot is never a self-conflict.
        let same = store
            .update(
                entry.id,
                SchedulePatch {
                    start_min: Some(entry.interval.start_min),
                    end_min: Some(entry.interval.end_min),
                    ..SchedulePatch::default()
                },
            )
            .expect("self-update");
        assert_eq!(same, entry);
    }

    #[test]
    fn update_merges_patch_and_revalidates() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");
        let victim = store
            .create(input(2, "102", 1, "09:00", "10:00"))
            .expect("victim");

        // Moving the second session into room 101 collides with the first.
        let before = store.get_all().expect("before");
        let err = store
            .update(
                victim.id,
                SchedulePatch {
                    room_number: Some("101".to_string()),
                    ..SchedulePatch::default()
                },
            )
            .expect_err("room move must conflict");
        assert!(matches!(err, ScheduleError::Conflict { .. }));
        assert_eq!(store.get_all().expect("after"), before);

        // Room 103 is free; the untouched fields survive the merge.
        let moved = store
            .update(
                victim.id,
                SchedulePatch {
                    room_number: Some("103".to_string()),
                    ..SchedulePatch::default()
                },
            )
            .expect("move to free room");
        assert_eq!(moved.id, victim.id);
        assert_eq!(moved.room_number, "103");
        assert_eq!(moved.interval, victim.interval);
        assert_eq!(moved.course_id, victim.course_id);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        let err = store
            .update(42, SchedulePatch::default())
            .expect_err("absent id");
        assert!(matches!(err, ScheduleError::NotFound(42)));
    }

    #[test]
    fn delete_removes_entry_or_reports_not_found() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        let entry = store
            .create(input(1, "101", 1, "09:00", "10:00"))
            .expect("seed");
        store.delete(entry.id).expect("delete");
        assert!(store.get_all().expect("all").is_empty());
        assert!(matches!(
            store.delete(entry.id),
            Err(ScheduleError::NotFound(_))
        ));
    }

    #[test]
    fn update_time_slot_preserves_duration() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        let entry = store
            .create(input(1, "101", 1, "09:15", "10:45"))
            .expect("seed");
        let duration = entry.interval.duration_min();

        let moved = store
            .update_time_slot(entry.id, 3, parse_hhmm("14:00").unwrap())
            .expect("move");
        assert_eq!(moved.interval.day_of_week, 3);
        assert_eq!(moved.interval.start_min, parse_hhmm("14:00").unwrap());
        assert_eq!(moved.interval.duration_min(), duration);
    }

    #[test]
    fn update_time_slot_checks_target_slot() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(1, "101", 3, "14:00", "15:00"))
            .expect("blocker");
        let entry = store
            .create(input(2, "101", 1, "09:00", "10:00"))
            .expect("mover");

        let err = store
            .update_time_slot(entry.id, 3, parse_hhmm("14:30").unwrap())
            .expect_err("target slot is occupied");
        assert!(matches!(err, ScheduleError::Conflict { .. }));
        // The mover keeps its original slot.
        let unchanged = store.get_by_id(entry.id).expect("reload");
        assert_eq!(unchanged.interval, entry.interval);
    }

    #[test]
    fn reads_filter_by_course_and_day() {
        let conn = test_conn();
        let store = ScheduleStore::new(&conn);
        store
            .create(input(7, "101", 1, "09:00", "10:00"))
            .expect("a");
        store
            .create(input(7, "102", 2, "09:00", "10:00"))
            .expect("b");
        store
            .create(input(8, "103", 1, "11:00", "12:00"))
            .expect("c");

        assert_eq!(store.get_by_course(7).expect("by course").len(), 2);
        let day1 = store.get_by_day(1).expect("by day");
        assert_eq!(day1.len(), 2);
        // Day listing comes back in start order.
        assert!(day1[0].interval.start_min <= day1[1].interval.start_min);
    }
}
