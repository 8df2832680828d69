use super::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("storyfuzz-{}-{}", name, nanos))
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn cli_args_map_onto_fuzz_options() {
    let cli = Cli::try_parse_from([
        "storyfuzz",
        "--folder",
        "stories",
        "--story-file",
        "main.ink",
        "--runs",
        "25",
        "--test-var",
        "testing",
        "--max-steps",
        "50",
        "--soft-step-limit",
        "--ooc",
        "--max-choices",
        "2",
        "--seed",
        "9",
    ])
    .expect("args should parse");

    let options = cli.fuzz_options();
    assert_eq!(options.folder, PathBuf::from("stories"));
    assert_eq!(options.story_file, "main.ink");
    assert_eq!(options.runs, 25);
    assert_eq!(options.test_var.as_deref(), Some("testing"));
    assert_eq!(options.max_steps, 50);
    assert!(!options.max_steps_is_error);
    assert!(options.ooc);
    assert_eq!(options.max_choices, Some(2));
    assert_eq!(options.seed, Some(9));
}

#[test]
fn cli_defaults_follow_fuzz_options() {
    let cli = Cli::try_parse_from(["storyfuzz", "--story-file", "main.ink"])
        .expect("args should parse");
    let options = cli.fuzz_options();
    let defaults = sf_tester::FuzzOptions {
        story_file: "main.ink".to_string(),
        ..sf_tester::FuzzOptions::default()
    };
    assert_eq!(options, defaults);
}

#[test]
fn missing_story_file_flag_is_a_usage_error() {
    let code = run_cli_from_args(["storyfuzz", "--runs", "3"]);
    assert_eq!(code, 2);
}

#[test]
fn run_writes_requested_reports() {
    let root = temp_path("run");
    write_file(&root.join("main.ink"), "Hello.\n* Left\n  Gone left.\n* Right\n  Gone right.\n");
    let csv = root.join("out").join("report.csv");
    let json = root.join("out").join("report.json");

    let code = run_cli_from_args([
        "storyfuzz".to_string(),
        "--folder".to_string(),
        arg(&root),
        "--story-file".to_string(),
        "main.ink".to_string(),
        "--runs".to_string(),
        "20".to_string(),
        "--seed".to_string(),
        "3".to_string(),
        "--csv".to_string(),
        arg(&csv),
        "--json".to_string(),
        arg(&json),
    ]);
    assert_eq!(code, 0);

    let csv_text = fs::read_to_string(&csv).expect("csv should exist");
    assert!(csv_text.starts_with("File,Line,Text,Visit Count,Visit %"));
    assert!(csv_text.contains("main.ink,1,\"Hello.\",20,100.00"));
    let json_text = fs::read_to_string(&json).expect("json should exist");
    assert!(json_text.contains("\"testRuns\": 20"));
}

#[test]
fn run_reports_session_errors() {
    let root = temp_path("broken");
    write_file(&root.join("main.ink"), "Hello.\n-> nowhere\n");

    let code = run_cli_from_args([
        "storyfuzz".to_string(),
        "--folder".to_string(),
        arg(&root),
        "--story-file".to_string(),
        "main.ink".to_string(),
    ]);
    assert_eq!(code, 1);

    let code = run_cli_from_args([
        "storyfuzz".to_string(),
        "--folder".to_string(),
        arg(&root),
        "--story-file".to_string(),
        "main.ink".to_string(),
        "--runs".to_string(),
        "0".to_string(),
    ]);
    assert_eq!(code, 1);
}

#[test]
fn failed_session_writes_no_report_files() {
    let root = temp_path("no-report");
    write_file(&root.join("main.ink"), "VAR testing = false\nHello.\n");
    let csv = root.join("out").join("report.csv");
    let json = root.join("out").join("report.json");

    let code = run_cli_from_args([
        "storyfuzz".to_string(),
        "--folder".to_string(),
        arg(&root),
        "--story-file".to_string(),
        "main.ink".to_string(),
        "--test-var".to_string(),
        "missing".to_string(),
        "--csv".to_string(),
        arg(&csv),
        "--json".to_string(),
        arg(&json),
    ]);
    assert_eq!(code, 1);
    assert!(!csv.exists());
    assert!(!json.exists());

    let code = run_cli_from_args([
        "storyfuzz".to_string(),
        "--folder".to_string(),
        arg(&root),
        "--story-file".to_string(),
        "main.ink".to_string(),
        "--test-var".to_string(),
        "testing".to_string(),
        "--csv".to_string(),
        arg(&csv),
    ]);
    assert_eq!(code, 0);
    assert!(csv.exists());
}
