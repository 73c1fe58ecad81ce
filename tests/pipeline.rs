//! End-to-end tests for the command-line contract.
//!
//! Drives the built `docmind` binary the way the web layer does: one
//! process per operation, parsing the last non-empty stdout line as JSON.
//! Uses the deterministic `hash` embedder and `echo` generator so no
//! network or model backend is needed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docmind_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docmind");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[db]
path = "{}/data/docmind.sqlite"

[chunking]
max_chars = 1000
overlap_chars = 200

[retrieval]
top_k = 4
history_window = 10

[embedding]
provider = "hash"
dims = 128

[generation]
provider = "echo"
"#,
        root.display()
    );

    let config_path = root.join("docmind.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docmind(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docmind_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docmind binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// The caller's parsing rule: the final non-empty stdout line is the result.
fn last_json_line(stdout: &str) -> serde_json::Value {
    let line = stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .last()
        .unwrap_or_else(|| panic!("no output lines in {:?}", stdout));
    serde_json::from_str(line)
        .unwrap_or_else(|e| panic!("last line is not JSON: {} ({})", line, e))
}

#[test]
fn ingest_single_text_file_reports_chunk_count() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();

    let (stdout, stderr, success) =
        run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    let json = last_json_line(&stdout);
    let results = json.as_array().expect("ingest result must be an array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["status"], "success");
    assert!(results[0]["chunkCount"].as_u64().unwrap() >= 1);
}

#[test]
fn partial_failure_yields_one_result_per_file_in_order() {
    let (tmp, config_path) = setup_test_env();

    let valid = tmp.path().join("valid.txt");
    fs::write(&valid, "First valid document about mountains.").unwrap();
    let corrupt = tmp.path().join("corrupt.pdf");
    fs::write(&corrupt, "this is not a pdf").unwrap();
    let valid2 = tmp.path().join("valid2.txt");
    fs::write(&valid2, "Second valid document about rivers.").unwrap();

    let (stdout, _, success) = run_docmind(
        &config_path,
        &[
            "ingest",
            valid.to_str().unwrap(),
            corrupt.to_str().unwrap(),
            valid2.to_str().unwrap(),
        ],
    );
    // One file failing is a logical failure, not a process failure
    assert!(success, "exit code must stay 0 on per-file failure");

    let results = last_json_line(&stdout);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[1]["status"], "error");
    assert!(results[1]["message"].as_str().unwrap().len() > 0);
    assert_eq!(results[2]["status"], "success");
}

#[test]
fn chat_answers_from_ingested_document() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();

    let (stdout, stderr, success) =
        run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    let (stdout, stderr, success) = run_docmind(
        &config_path,
        &[
            "chat",
            "--query",
            "What is the capital of France?",
            "--filter",
            "paris.txt",
        ],
    );
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);

    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    assert!(
        json["answer"].as_str().unwrap().contains("Paris"),
        "answer should be grounded in the document: {}",
        json["answer"]
    );
}

#[test]
fn chat_with_never_ingested_filter_still_succeeds() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();
    run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);

    let (stdout, _, success) = run_docmind(
        &config_path,
        &["chat", "--query", "Anything at all?", "--filter", "ghost.pdf"],
    );
    assert!(success);

    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    assert!(
        json["answer"].as_str().unwrap().contains("No relevant"),
        "expected a no-context answer, got: {}",
        json["answer"]
    );
}

#[test]
fn filter_restricts_retrieval_to_requested_source() {
    let (tmp, config_path) = setup_test_env();

    let paris = tmp.path().join("paris.txt");
    fs::write(&paris, "Paris is the capital of France.").unwrap();
    let snakes = tmp.path().join("snakes.txt");
    fs::write(&snakes, "Pythons are large nonvenomous snakes.").unwrap();

    run_docmind(
        &config_path,
        &["ingest", paris.to_str().unwrap(), snakes.to_str().unwrap()],
    );

    let (stdout, _, success) = run_docmind(
        &config_path,
        &[
            "chat",
            "--query",
            "Tell me about snakes",
            "--filter",
            "paris.txt",
        ],
    );
    assert!(success);

    // The echo generator returns the retrieved context verbatim, so the
    // answer exposes exactly what retrieval saw.
    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    let answer = json["answer"].as_str().unwrap();
    assert!(!answer.contains("nonvenomous"), "filter leaked: {}", answer);
}

#[test]
fn chat_accepts_json_filter_list_and_history() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();
    run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);

    let (stdout, _, success) = run_docmind(
        &config_path,
        &[
            "chat",
            "--query",
            "And its capital?",
            "--filter",
            r#"["paris.txt","other.pdf"]"#,
            "--history",
            r#"[{"role":"user","content":"Let's talk about France."},{"role":"assistant","content":"Sure."}]"#,
        ],
    );
    assert!(success);

    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    assert!(json["answer"].as_str().unwrap().contains("Paris"));
}

#[test]
fn malformed_history_reports_error_object_with_exit_zero() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_docmind(
        &config_path,
        &["chat", "--query", "q", "--history", "{definitely not json"],
    );
    assert!(success, "chat must exit 0 and report a structured error");

    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("malformed arguments"));
}

#[test]
fn delete_purges_source_from_retrieval() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();
    run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);

    let (stdout, _, success) = run_docmind(&config_path, &["delete", "paris.txt"]);
    assert!(success);
    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    assert!(json["deletedChunks"].as_u64().unwrap() >= 1);

    let (stdout, _, _) = run_docmind(
        &config_path,
        &[
            "chat",
            "--query",
            "What is the capital of France?",
            "--filter",
            "paris.txt",
        ],
    );
    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    assert!(json["answer"].as_str().unwrap().contains("No relevant"));
}

#[test]
fn reingest_same_file_does_not_duplicate() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();

    run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);
    let (stdout, _, _) = run_docmind(&config_path, &["status"]);
    let before = last_json_line(&stdout);

    run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);
    let (stdout, _, _) = run_docmind(&config_path, &["status"]);
    let after = last_json_line(&stdout);

    assert_eq!(before["documents"], after["documents"]);
    assert_eq!(before["chunks"], after["chunks"]);
    assert_eq!(before["vectors"], after["vectors"]);
}

#[test]
fn status_reports_index_counts() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("notes.txt");
    fs::write(&file, "Some notes to index.").unwrap();
    run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);

    let (stdout, _, success) = run_docmind(&config_path, &["status"]);
    assert!(success);
    let json = last_json_line(&stdout);
    assert_eq!(json["status"], "success");
    assert_eq!(json["documents"], 1);
    assert!(json["chunks"].as_i64().unwrap() >= 1);
    assert_eq!(json["chunks"], json["vectors"]);
}

#[test]
fn stdout_final_line_is_json_even_with_diagnostics() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("paris.txt");
    fs::write(&file, "Paris is the capital of France.").unwrap();

    let (stdout, _, _) = run_docmind(&config_path, &["ingest", file.to_str().unwrap()]);
    // Every stdout line must be part of the JSON contract; diagnostics go
    // to stderr. The last (and only) non-empty line parses as JSON.
    let non_empty: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(non_empty.len(), 1, "stdout must carry exactly the JSON result");
    last_json_line(&stdout);
}

#[test]
fn all_files_failing_still_exits_zero() {
    let (tmp, config_path) = setup_test_env();
    let a = tmp.path().join("bad1.pdf");
    fs::write(&a, "nope").unwrap();
    let b = tmp.path().join("bad2.docx");
    fs::write(&b, "nope").unwrap();

    let (stdout, _, success) = run_docmind(
        &config_path,
        &["ingest", a.to_str().unwrap(), b.to_str().unwrap()],
    );
    assert!(success);

    let results = last_json_line(&stdout);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["status"] == "error"));
}
