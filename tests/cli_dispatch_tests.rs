use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_turnforge")
}

fn demo_data() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/data/demo_battle.yaml").to_string()
}

fn unique_temp_path(name: &str, ext: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("turnforge-{name}-{stamp}.{ext}"))
}

#[test]
fn simulate_command_plays_demo_battle_to_victory() {
    let output = Command::new(bin())
        .args(["simulate", "--data", &demo_data(), "--level", "forest_edge", "--seed", "3"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("simulate should emit json");
    assert_eq!(payload["level_id"], "forest_edge");
    assert_eq!(payload["result"], "victory");
    assert_eq!(payload["seed"], 3);
    assert!(payload["actions"].as_u64().unwrap_or(0) > 0);
    assert_eq!(payload["enemies"].as_array().map(Vec::len), Some(2));
}

#[test]
fn simulate_table_prints_header_and_one_row() {
    let output = Command::new(bin())
        .args(["simulate", "--data", &demo_data(), "--level", "forest_edge", "--table"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "level\tseed\tresult\tturns\tactions");
    assert!(lines[1].starts_with("forest_edge\t"));
}

#[test]
fn simulate_writes_csv_report() {
    let path = unique_temp_path("report", "csv");
    let output = Command::new(bin())
        .args([
            "simulate",
            "--data",
            &demo_data(),
            "--level",
            "forest_edge",
            "--csv",
            path.to_string_lossy().as_ref(),
        ])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let csv = fs::read_to_string(&path).expect("report should be written");
    let mut lines = csv.lines();
    assert!(lines
        .next()
        .is_some_and(|header| header.starts_with("turn,entry_id,side,actor_id,skill_id")));
    assert!(lines.next().is_some());

    let _ = fs::remove_file(path);
}

#[test]
fn timeline_command_prints_ready_round() {
    let output = Command::new(bin())
        .args(["timeline", "--data", &demo_data(), "--level", "forest_edge"])
        .output()
        .expect("timeline should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("timeline should emit json");
    assert_eq!(payload["phase"], "READY");
    assert_eq!(payload["roundId"], 1);
    let entries = payload["entries"].as_array().expect("entries array");
    assert!(entries.iter().any(|entry| entry["side"] == "self"));
    assert!(entries.iter().any(|entry| entry["side"] == "enemy"));
    let times: Vec<f64> = entries.iter().filter_map(|entry| entry["time"].as_f64()).collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn validate_command_accepts_demo_data() {
    let output = Command::new(bin())
        .args(["validate", "--data", &demo_data()])
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("validation passed"));
}

#[test]
fn validate_command_returns_non_zero_on_invalid_data() {
    let path = unique_temp_path("invalid", "json");
    fs::write(
        &path,
        r#"{
            "player": { "stats": { "hp": 10, "maxHp": 10 }, "skills": ["slash"] },
            "skills": [{ "id": "slash", "cost": -2 }],
            "levels": [{ "id": "empty", "waves": [] }]
        }"#,
    )
    .expect("fixture should be written");

    let output = Command::new(bin())
        .args(["validate", "--data", path.to_string_lossy().as_ref()])
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("negative AP cost"));
    assert!(stderr.contains("validation failed"));

    let _ = fs::remove_file(path);
}

#[test]
fn missing_data_file_is_a_config_error() {
    let output = Command::new(bin())
        .args(["simulate", "--data", "/nonexistent/turnforge.yaml"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"));
}

#[test]
fn unknown_subcommand_prints_usage() {
    let output = Command::new(bin())
        .arg("serve")
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"));
}
