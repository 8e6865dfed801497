use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("planbook.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT,
            instructor TEXT,
            credits INTEGER NOT NULL,
            color TEXT
        )",
        [],
    )?;

    // Per-course grading weights; one row per category name.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_categories(
            course_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            weight REAL NOT NULL,
            PRIMARY KEY(course_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            student_no TEXT NOT NULL,
            major TEXT,
            year TEXT,
            gpa REAL NOT NULL DEFAULT 0,
            enrollment_date TEXT,
            phone_number TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'Active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            category TEXT,
            due_date TEXT,
            score REAL,
            max_score REAL NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            priority TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id)",
        [],
    )?;

    // Times are minutes since midnight; the no-overlap invariant is enforced
    // by the store, not the schema.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_sessions(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            room_number TEXT NOT NULL,
            session_type TEXT NOT NULL,
            day_of_week INTEGER NOT NULL,
            start_min INTEGER NOT NULL,
            end_min INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_sessions_course ON schedule_sessions(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_sessions_room_day ON schedule_sessions(room_number, day_of_week)",
        [],
    )?;

    Ok(())
}
