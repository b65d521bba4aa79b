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

#[test]
fn export_then_import_restores_the_workspace() {
    let workspace = temp_dir("rasid-backup");
    let bundle = workspace.join("out").join("backup.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Ahmed", "nationalId": "9001" }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!("rasid-workspace-v1"));
    assert_eq!(
        exported["dbSha256"].as_str().expect("dbSha256").len(),
        64
    );
    assert!(bundle.is_file());

    // Diverge from the snapshot, then roll back.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "Extra", "nationalId": "9002" }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().expect("students").len(), 2);

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormat"], json!("rasid-workspace-v1"));

    let listed = request_ok(&mut stdin, &mut reader, "7", "students.list", json!({}));
    let students = listed["students"].as_array().expect("students");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["name"], json!("Ahmed"));

    let _ = child.kill();
}

#[test]
fn import_rejects_junk_and_daemon_survives() {
    let workspace = temp_dir("rasid-badbundle");
    let junk = workspace.join("junk.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Ahmed", "nationalId": "9101" }),
    );

    std::fs::write(&junk, b"not a zip archive").expect("write junk file");
    let failed = request(
        &mut stdin,
        &mut reader,
        "3",
        "backup.import",
        json!({ "inPath": junk.to_string_lossy() }),
    );
    assert_eq!(failed["ok"], json!(false));
    assert_eq!(failed["error"]["code"], json!("restore_failed"));

    // The existing database survived and reopened.
    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().expect("students").len(), 1);

    let exported = request(
        &mut stdin,
        &mut reader,
        "5",
        "backup.export",
        json!({}),
    );
    assert_eq!(exported["ok"], json!(false));
    assert_eq!(exported["error"]["code"], json!("bad_params"));

    let _ = child.kill();
}
