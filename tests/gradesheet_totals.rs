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
    let exe = env!("CARGO_BIN_EXE_rasidd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rasidd");
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
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

fn set_score(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: &str,
    category: &str,
    index: usize,
    value: f64,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "grades.update",
        json!({
            "studentId": student_id,
            "semester": "semester1",
            "period": "period1",
            "category": category,
            "index": index,
            "value": value,
        }),
    );
}

#[test]
fn scores_compose_into_the_hundred_point_sheet() {
    let workspace = temp_dir("rasid-sheet");
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
        json!({ "name": "Ahmed", "nationalId": "1001" }),
    );
    let sid = created["studentId"].as_str().expect("studentId").to_string();

    set_score(&mut stdin, &mut reader, "3", &sid, "tests", 0, 15.0);
    set_score(&mut stdin, &mut reader, "4", &sid, "tests", 1, 18.0);
    set_score(&mut stdin, &mut reader, "5", &sid, "quranRecitation", 0, 8.0);
    set_score(&mut stdin, &mut reader, "6", &sid, "quranRecitation", 1, 10.0);
    set_score(&mut stdin, &mut reader, "7", &sid, "quranMemorization", 0, 9.0);
    for (i, id) in (0..6usize).zip(8..) {
        set_score(&mut stdin, &mut reader, &id.to_string(), &sid, "homework", i, 1.0);
    }
    set_score(&mut stdin, &mut reader, "14", &sid, "participation", 0, 1.0);
    set_score(&mut stdin, &mut reader, "15", &sid, "participation", 1, 1.0);
    set_score(&mut stdin, &mut reader, "16", &sid, "performanceTasks", 0, 7.0);
    set_score(&mut stdin, &mut reader, "17", &sid, "performanceTasks", 1, 9.0);
    set_score(&mut stdin, &mut reader, "18", &sid, "classInteraction", 0, 6.0);

    let sheet = request_ok(&mut stdin, &mut reader, "19", "gradesheet.open", json!({}));
    assert_eq!(sheet["semester"], json!("semester1"));
    assert_eq!(sheet["period"], json!("period1"));
    assert_eq!(sheet["testMethod"], json!("best"));
    let row = &sheet["students"][0];
    assert_eq!(row["studentId"], json!(sid));

    // Default test method is best-of.
    assert_eq!(row["categories"]["tests"], json!("18.00"));
    assert_eq!(row["categories"]["homework"], json!("6.00"));
    assert_eq!(row["categories"]["participation"], json!("2.00"));
    assert_eq!(row["categories"]["performanceTasks"], json!("9.00"));
    assert_eq!(row["categories"]["classInteraction"], json!("6.00"));
    assert_eq!(row["categories"]["quranRecitation"], json!("9.00"));
    assert_eq!(row["categories"]["quranMemorization"], json!("9.00"));

    // Composite totals take tests by sum: 33 + 9 + 9 = 51 major,
    // 6 + 2 + 9 + 6 = 23 coursework.
    assert_eq!(row["majorAssessments"], json!("51.00"));
    assert_eq!(row["coursework"], json!("23.00"));
    assert_eq!(row["finalTotal"], json!("74.00"));

    // Flipping the toggle only moves the tests column.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "settings.update",
        json!({ "patch": { "testMethod": "average" } }),
    );
    let sheet = request_ok(&mut stdin, &mut reader, "21", "gradesheet.open", json!({}));
    let row = &sheet["students"][0];
    assert_eq!(row["categories"]["tests"], json!("16.50"));
    assert_eq!(row["categories"]["homework"], json!("6.00"));
    assert_eq!(row["finalTotal"], json!("74.00"));

    let _ = child.kill();
}

#[test]
fn out_of_range_entries_are_rejected_without_saving() {
    let workspace = temp_dir("rasid-range");
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
        json!({ "name": "Sara", "nationalId": "2002" }),
    );
    let sid = created["studentId"].as_str().expect("studentId").to_string();

    let over = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.update",
        json!({
            "studentId": sid,
            "semester": "semester1",
            "period": "period1",
            "category": "tests",
            "index": 0,
            "value": 25.0,
        }),
    );
    assert_eq!(over["ok"], json!(false));
    assert_eq!(over["error"]["code"], json!("score_out_of_range"));
    assert_eq!(over["error"]["details"]["max"], json!(20.0));

    let bad_index = request(
        &mut stdin,
        &mut reader,
        "4",
        "grades.update",
        json!({
            "studentId": sid,
            "semester": "semester1",
            "period": "period1",
            "category": "tests",
            "index": 2,
            "value": 10.0,
        }),
    );
    assert_eq!(bad_index["ok"], json!(false));
    assert_eq!(bad_index["error"]["code"], json!("bad_params"));

    // Nothing stuck.
    let grades = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.get",
        json!({ "studentId": sid }),
    );
    assert_eq!(
        grades["grades"]["semester1"]["period1"]["tests"],
        json!([null, null])
    );
    assert_eq!(grades["flags"], json!([]));

    // Clearing with null works and duplicate national ids are refused.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.update",
        json!({
            "studentId": sid,
            "semester": "semester1",
            "period": "period1",
            "category": "tests",
            "index": 0,
            "value": null,
        }),
    );
    let dup = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({ "name": "Other", "nationalId": "2002" }),
    );
    assert_eq!(dup["ok"], json!(false));
    assert_eq!(dup["error"]["code"], json!("conflict"));

    let _ = child.kill();
}
