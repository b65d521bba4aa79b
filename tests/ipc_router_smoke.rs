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

#[test]
fn health_workspace_and_settings_roundtrip() {
    let workspace = temp_dir("rasid-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    // Data methods demand a workspace first.
    let early = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(early["ok"], json!(false));
    assert_eq!(early["error"]["code"], json!("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let defaults = request_ok(&mut stdin, &mut reader, "4", "settings.get", json!({}));
    assert_eq!(defaults["currentPeriod"], json!("period1"));
    assert_eq!(defaults["activeSemesterKey"], json!("semester1"));
    assert_eq!(defaults["testMethod"], json!("best"));
    assert_eq!(defaults["currentWeek"], json!(1));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.update",
        json!({ "patch": {
            "currentPeriod": "period2",
            "activeSemesterKey": "semester2",
            "testMethod": "average",
            "currentWeek": 7,
        }}),
    );
    assert_eq!(updated["currentPeriod"], json!("period2"));
    assert_eq!(updated["activeSemesterKey"], json!("semester2"));
    assert_eq!(updated["testMethod"], json!("average"));
    assert_eq!(updated["currentWeek"], json!(7));

    let bad_week = request(
        &mut stdin,
        &mut reader,
        "6",
        "settings.update",
        json!({ "patch": { "currentWeek": 21 } }),
    );
    assert_eq!(bad_week["ok"], json!(false));
    assert_eq!(bad_week["error"]["code"], json!("bad_params"));

    let bad_method = request(
        &mut stdin,
        &mut reader,
        "7",
        "settings.update",
        json!({ "patch": { "testMethod": "median" } }),
    );
    assert_eq!(bad_method["ok"], json!(false));

    let unknown = request(&mut stdin, &mut reader, "8", "nope.method", json!({}));
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));

    let _ = child.kill();
}
