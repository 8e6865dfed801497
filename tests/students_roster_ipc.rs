use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_planbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn planbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        !value.get("ok").and_then(|v| v.as_bool()).unwrap_or(true),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().expect("error payload")
}

#[test]
fn roster_crud_round_trip() {
    let workspace = temp_dir("planbookd-students");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "firstName": "Ada",
            "lastName": "Byron",
            "email": "ada@example.edu",
            "studentId": "STU001",
            "major": "Mathematics",
            "year": "Sophomore",
            "enrollmentDate": "2024-09-01",
        }),
    );
    let id = created
        .pointer("/student/id")
        .and_then(|v| v.as_i64())
        .expect("student id");
    assert_eq!(id, 1);
    // Omitted fields get their defaults.
    assert_eq!(created.pointer("/student/gpa").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(
        created.pointer("/student/status").and_then(|v| v.as_str()),
        Some("Active")
    );
    assert_eq!(
        created.pointer("/student/phoneNumber").and_then(|v| v.as_str()),
        Some("")
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@example.edu",
            "studentId": "STU002",
        }),
    );
    assert_eq!(second.pointer("/student/id").and_then(|v| v.as_i64()), Some(2));

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    let students = listed
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students");
    assert_eq!(students.len(), 2);
    // Sorted by last name.
    assert_eq!(
        students[0].get("lastName").and_then(|v| v.as_str()),
        Some("Byron")
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "id": id, "gpa": 3.85, "year": "Junior" }),
    );
    assert_eq!(updated.pointer("/student/gpa").and_then(|v| v.as_f64()), Some(3.85));
    assert_eq!(
        updated.pointer("/student/year").and_then(|v| v.as_str()),
        Some("Junior")
    );
    // Untouched fields survive a partial update.
    assert_eq!(
        updated.pointer("/student/email").and_then(|v| v.as_str()),
        Some("ada@example.edu")
    );

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.get",
        json!({ "id": id }),
    );
    assert_eq!(
        fetched.pointer("/student/studentId").and_then(|v| v.as_str()),
        Some("STU001")
    );

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.delete",
        json!({ "id": id }),
    );
    assert_eq!(
        deleted.pointer("/student/firstName").and_then(|v| v.as_str()),
        Some("Ada")
    );

    let error = request_err(&mut stdin, &mut reader, "8", "students.get", json!({ "id": id }));
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_found"));

    // Ids come from max + 1 over the remaining rows.
    let third = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.create",
        json!({
            "firstName": "Alan",
            "lastName": "Turing",
            "email": "alan@example.edu",
            "studentId": "STU003",
        }),
    );
    assert_eq!(third.pointer("/student/id").and_then(|v| v.as_i64()), Some(3));

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn unknown_student_ids_are_rejected() {
    let workspace = temp_dir("planbookd-students-missing");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (id, method) in [
        ("2", "students.get"),
        ("3", "students.update"),
        ("4", "students.delete"),
    ] {
        let error = request_err(&mut stdin, &mut reader, id, method, json!({ "id": 42 }));
        assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_found"));
    }

    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "firstName": "Only", "lastName": "Name" }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("bad_params"));

    let _ = child.kill();
    let _ = child.wait();
}
