use std::io::Write;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;
use serde_json::Value;

fn monitor() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("monitor"))
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err})\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn valid_equation_is_formatted() {
    let output = monitor()
        .args(["equation", "(A /   B) *\t100", "--known", "A,B"])
        .output()
        .expect("run monitor");
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["ok"], Value::Bool(true));
    assert_eq!(report["formatted"], "($A / $B) * 100");
    assert_eq!(report["tokens"][0]["type"], "PAREN_OPEN");
    assert_eq!(report["errors"], Value::Array(Vec::new()));
}

#[test]
fn unknown_variable_exits_with_one() {
    let output = monitor()
        .args(["equation", "A + C", "--known", "A,B"])
        .output()
        .expect("run monitor");
    assert_eq!(output.status.code(), Some(1));

    let report = stdout_json(&output);
    assert_eq!(report["ok"], Value::Bool(false));
    assert!(report.get("formatted").is_none());
    assert_eq!(report["errors"][0]["message"], "Unknown query \"C\"");
    assert_eq!(report["errors"][0]["start"], 4);
}

#[test]
fn case_insensitive_flag_accepts_lowercase_names() {
    let output = monitor()
        .args(["equation", "a * 2", "--known", "A", "--case-insensitive"])
        .output()
        .expect("run monitor");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["formatted"], "$a * 2");
}

#[test]
fn syntax_error_reports_offset() {
    let output = monitor()
        .args(["equation", "A +", "--known", "A"])
        .output()
        .expect("run monitor");
    assert_eq!(output.status.code(), Some(1));
    let report = stdout_json(&output);
    assert_eq!(report["syntaxError"]["span"]["start"], 3);
}

#[test]
fn edit_session_replays_timeline_file() {
    let timeline = write_temp("0\tA\n50\tA +\n120\tA + 1\n");
    let output = monitor()
        .args(["edit-session", "--known", "A", "--input"])
        .arg(timeline.path())
        .output()
        .expect("run monitor");
    assert!(output.status.success());

    let events = stdout_json(&output);
    assert_eq!(
        events,
        serde_json::json!([{"outcome": "committed", "atMs": 320, "value": "$A + 1"}])
    );
}

#[test]
fn edit_session_honours_config_file() {
    let config = write_temp(r#"{"settle_delay_ms": 10}"#);
    let mut child = monitor()
        .arg("--config")
        .arg(config.path())
        .args(["edit-session", "--known", "A"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn monitor");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(b"0\tA\n")
        .expect("write timeline");

    let output = child.wait_with_output().expect("wait for monitor");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)[0]["atMs"], 10);
}

#[test]
fn invalid_config_exits_with_two() {
    let config = write_temp("{not json");
    let output = monitor()
        .arg("--config")
        .arg(config.path())
        .args(["equation", "A", "--known", "A"])
        .output()
        .expect("run monitor");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("parsing config"));
}

const TREE: &str = r#"[
    {"kind": "transaction", "transaction.op": "http.server", "transaction": "/api/users", "event_id": "e1"},
    {"kind": "span", "op": "db.query", "description": "SELECT * FROM users", "span_id": "s1"},
    {"kind": "span", "op": "http.client", "description": "GET /profile", "span_id": "s2"},
    {"kind": "span", "op": "db.query", "description": "UPDATE users", "span_id": "s3"},
    {"kind": "error", "level": "error", "title": "Timeout"}
]"#;

#[test]
fn trace_search_lists_matches_in_order() {
    let tree = write_temp(TREE);
    let output = monitor()
        .args(["trace-search", "--query", "db.query", "--tree"])
        .arg(tree.path())
        .output()
        .expect("run monitor");
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["matchCount"], 2);
    assert_eq!(report["matches"][0]["index"], 1);
    assert_eq!(report["matches"][1]["index"], 3);
    assert!(report.get("focused").is_none());
}

#[test]
fn trace_search_navigation_wraps() {
    let tree = write_temp(TREE);
    let output = monitor()
        .args(["trace-search", "--query", "db.query", "--next", "3", "--chunk", "2", "--tree"])
        .arg(tree.path())
        .output()
        .expect("run monitor");
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["focused"]["ordinal"], 0);
    assert_eq!(report["focused"]["index"], 1);

    let output = monitor()
        .args(["trace-search", "--query", "db.query", "--previous", "1", "--tree"])
        .arg(tree.path())
        .output()
        .expect("run monitor");
    let report = stdout_json(&output);
    assert_eq!(report["focused"]["ordinal"], 1);
    assert_eq!(report["focused"]["index"], 3);
}

#[test]
fn malformed_tree_exits_with_two() {
    let tree = write_temp(r#"[{"kind": "profile"}]"#);
    let output = monitor()
        .args(["trace-search", "--query", "x", "--tree"])
        .arg(tree.path())
        .output()
        .expect("run monitor");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_does_not_panic_on_broken_pipe() {
    let tree = write_temp(TREE);
    let mut child = monitor()
        .args(["trace-search", "--query", "s", "--tree"])
        .arg(tree.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn monitor");

    // Closing the read end forces stdout writes to return EPIPE / BrokenPipe.
    drop(child.stdout.take());

    let output = child.wait_with_output().expect("wait for monitor");
    assert!(
        output.status.success(),
        "expected success even when stdout is closed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
