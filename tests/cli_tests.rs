mod common;
use common::*;

use tempfile::TempDir;

#[test]
fn test_pipeline_prints_word_count() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "tweets.csv", TWEETS);

    let (stdout, stderr, code) = run_recordflow(&["pipeline", path_str(&file)]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("The number of words in records containing #EasyBatch = 7"));
    assert!(stdout.contains("Job 'pipeline-job' completed"));
}

#[test]
fn test_split_json_output() {
    let dir = TempDir::new().unwrap();
    let part1 = write_file(&dir, "part1.csv", "id,user,message\n1,a,x\n2,b,y\n");
    let part2 = write_file(&dir, "part2.csv", "id,user,message\n3,c,z\n");

    let (stdout, stderr, code) = run_recordflow(&[
        "split",
        path_str(&part1),
        path_str(&part2),
        "--json",
        "--threads",
        "2",
    ]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(value["merged"]["job_name"], "parallel-jobs");
    assert_eq!(value["merged"]["read_count"], 3);
    assert_eq!(value["merged"]["status"], "completed");
}

#[test]
fn test_fork_join_prints_joined_tweets() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "tweets.csv", TWEETS);

    let (stdout, stderr, code) = run_recordflow(&["fork-join", path_str(&file), "--read-timeout", "10s"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    for id in 1..=6 {
        assert!(stdout.contains(&format!("#{} @", id)), "missing tweet {} in {}", id, stdout);
    }
    assert!(stdout.contains("Job 'join-job' completed: 6 read"));
}

#[test]
fn test_filter_merges_two_halves() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "tweets.csv", TWEETS);

    let (stdout, _stderr, code) = run_recordflow(&["filter", path_str(&file)]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Merged: Job 'parallel-jobs' completed: 12 read, 6 filtered, 0 errors, 6 succeeded"));
}

#[test]
fn test_cbrd_on_directory() {
    let dir = TempDir::new().unwrap();
    for name in ["a.csv", "b.xml", "c.log"] {
        write_file(&dir, name, "x");
    }

    let (stdout, _stderr, code) = run_recordflow(&["cbrd", path_str(dir.path())]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Job 'master-job' completed: 3 read, 1 filtered, 0 errors, 2 succeeded"));
    assert!(stdout.contains("Job 'csv-worker-job' completed: 1 read"));
    assert!(stdout.contains("Job 'xml-worker-job' completed: 1 read"));
}

#[test]
fn test_missing_input_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.csv");

    let (stdout, _stderr, code) = run_recordflow(&["pipeline", path_str(&missing)]);
    assert_eq!(code, 1);
    assert!(stdout.contains("failed"));
    assert!(stdout.contains("unable to open source"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "custom.ini", "[executor]\nthreads = banana\n");
    let file = write_file(&dir, "tweets.csv", TWEETS);

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_recordflow"))
        .args(["--config", path_str(&config), "pipeline", path_str(&file)])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid threads"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "tweets.csv", TWEETS);

    let (stdout, stderr, code) = run_recordflow(&["-v", "pipeline", path_str(&file)]);
    assert_eq!(code, 0);
    assert!(stderr.contains("job started"));
    assert!(!stdout.contains("job started"));
}
