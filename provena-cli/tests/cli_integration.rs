//! CLI integration tests for provena-cli.
//!
//! These tests run the actual binary against small synthetic corpora and
//! check outputs, exit codes, and report artifacts.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Get a Command for the provena binary with a clean environment.
fn provena() -> Command {
    let mut cmd = Command::cargo_bin("provena").unwrap();
    for var in [
        "PROVENA_ORIGINALS",
        "PROVENA_RULE_SET",
        "PROVENA_POLICY",
        "PROVENA_THREADS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn textured(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let cols = width.div_ceil(8);
    let rows = height.div_ceil(8);
    let palette: Vec<[u8; 3]> = (0..cols * rows).map(|_| rng.gen()).collect();
    RgbImage::from_fn(width, height, |x, y| Rgb(palette[((y / 8) * cols + x / 8) as usize]))
}

/// Workspace layout:
///
/// ```text
/// originals/original_01.png, original_02.png
/// modified/copy_01_a.png   (identical to original_01)
/// random/noise_99_a.png    (unrelated)
/// ```
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    for sub in ["originals", "modified", "random"] {
        fs::create_dir(root.join(sub)).unwrap();
    }
    let original = textured(160, 120, 1);
    original.save(root.join("originals/original_01.png")).unwrap();
    textured(160, 120, 2).save(root.join("originals/original_02.png")).unwrap();
    original.save(root.join("modified/copy_01_a.png")).unwrap();
    textured(160, 120, 99).save(root.join("random/noise_99_a.png")).unwrap();
    dir
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ============================================================================
// Help and Usage Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    provena()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Content-based image provenance matching"))
        .stdout(predicate::str::contains("match"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_help_shows_exit_codes() {
    provena()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_match_help_shows_options() {
    provena()
        .args(["match", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--originals"))
        .stdout(predicate::str::contains("--rule-set"))
        .stdout(predicate::str::contains("--policy"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_unknown_rule_set_is_usage_error() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .args(["match", "modified/copy_01_a.png", "--rule-set", "everything"])
        .assert()
        .code(64);
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    provena().assert().code(64);
}

// ============================================================================
// Match Command Tests
// ============================================================================

#[test]
fn test_match_identical_copy() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .args(["match", "modified/copy_01_a.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MATCH to original_01.png"))
        .stdout(predicate::str::contains("100/100"));
}

#[test]
fn test_match_json_output() {
    let ws = workspace();
    let output = provena()
        .current_dir(ws.path())
        .args([
            "match",
            "modified/copy_01_a.png",
            "--rule-set",
            "extended",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["verdict"]["kind"], "match");
    assert_eq!(json["verdict"]["target"], "original_01.png");
    assert_eq!(json["max_total"], 150);
    assert_eq!(json["evidence"].as_array().unwrap().len(), 4);
    assert_eq!(json["evidence"][3]["rule_name"], "ORB");
}

#[test]
fn test_match_threshold_priority_via_env() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .env("PROVENA_RULE_SET", "extended")
        .env("PROVENA_POLICY", "threshold-priority")
        .args(["match", "modified/copy_01_a.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Strong geometric match"));
}

#[test]
fn test_match_missing_probe_exit_code() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .args(["match", "modified/absent.png"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read probe"));
}

#[test]
fn test_match_undecodable_probe_exit_code() {
    let ws = workspace();
    fs::write(ws.path().join("modified/broken.jpg"), b"not an image at all").unwrap();
    provena()
        .current_dir(ws.path())
        .args(["match", "modified/broken.jpg"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to decode probe"));
}

#[test]
fn test_match_missing_originals_exit_code() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .args(["match", "modified/copy_01_a.png", "--originals", "nowhere"])
        .assert()
        .code(66);
}

#[test]
fn test_match_empty_originals_rejects() {
    let ws = workspace();
    fs::create_dir(ws.path().join("empty")).unwrap();
    provena()
        .current_dir(ws.path())
        .args(["match", "modified/copy_01_a.png", "--originals", "empty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REJECTED"));
}

// ============================================================================
// Batch Command Tests
// ============================================================================

#[test]
fn test_batch_writes_report() {
    let ws = workspace();
    let report = ws.path().join("out/results.txt");

    provena()
        .current_dir(ws.path())
        .args([
            "batch",
            "modified",
            "random",
            "--expect-rejected",
            "random",
            "--output",
            path_str(&report),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("modified: 100.00% (1/1)"));

    let text = fs::read_to_string(&report).unwrap();
    assert!(text.starts_with("Processing: copy_01_a.png\n"));
    assert!(text.contains("Rule 1 (Metadata): FIRED"));
    assert!(text.contains("Rule 3 (Template): FIRED - Match score 1.00 -> 40/40 points"));
    assert!(text.contains("Final Score: 100/100 -> MATCH to original_01.png"));
    assert!(text.contains("Processing: noise_99_a.png"));
}

#[test]
fn test_batch_to_stdout() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .args(["batch", "modified"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Processing: copy_01_a.png"))
        .stdout(predicate::str::contains("Final Score:"));
}

#[test]
fn test_batch_missing_directory_exit_code() {
    let ws = workspace();
    provena()
        .current_dir(ws.path())
        .args(["batch", "modified", "nonexistent"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read probe directory"));
}

// ============================================================================
// Evaluate Command Tests
// ============================================================================

#[test]
fn test_evaluate_writes_comparison() {
    let ws = workspace();
    fs::write(
        ws.path().join("ground_truth.json"),
        r#"{"modified/copy_01_a.png": "original_01", "random/noise_99_a.png": null}"#,
    )
    .unwrap();

    provena()
        .args(["evaluate", "--base-dir", path_str(ws.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("SUMMARY"));

    let comparison: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ws.path().join("comparison.json")).unwrap())
            .unwrap();
    assert!(comparison["generated_at"].is_string());
    assert_eq!(comparison["summary"]["overall"]["total"], 2);
    assert_eq!(comparison["summary"]["by_category"]["modified"]["correct"], 1);
    assert_eq!(
        comparison["summary"]["by_category"]["modified"]["accuracy_percent"],
        100.0
    );

    let first = &comparison["results"][0];
    assert_eq!(first["file"], "modified/copy_01_a.png");
    assert_eq!(first["category"], "modified");
    assert_eq!(first["raw_predicted"], "original_01.png");
    assert_eq!(first["predicted"], "original_01");
    assert_eq!(first["correct"], true);

    let predictions: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ws.path().join("predictions.json")).unwrap())
            .unwrap();
    assert!(predictions["predictions"]["random/noise_99_a.png"].is_object());
}

#[test]
fn test_evaluate_missing_ground_truth_exit_code() {
    let ws = workspace();
    provena()
        .args(["evaluate", "--base-dir", path_str(ws.path())])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read ground truth"));
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_validate_scores_batch_report() {
    let ws = workspace();
    let report = ws.path().join("results.txt");
    fs::write(
        ws.path().join("ground_truth.json"),
        r#"{"modified/copy_01_a.png": "original_01", "random/noise_99_a.png": null}"#,
    )
    .unwrap();

    provena()
        .current_dir(ws.path())
        .args(["batch", "modified", "random", "--output", path_str(&report)])
        .assert()
        .success();

    provena()
        .current_dir(ws.path())
        .args(["validate", "--report", path_str(&report)])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "modified/copy_01_a.png -> raw=original_01.png | expected=original_01",
        ))
        .stdout(predicate::str::contains("random/noise_99_a.png -> raw="))
        .stdout(predicate::str::contains("--- SUMMARY ---"))
        .stdout(predicate::str::is_match(r"Overall: \d/2 \(").unwrap())
        .stdout(predicate::str::contains("modified: 1/1 (100%)"));
}

#[test]
fn test_validate_missing_report_exit_code() {
    let ws = workspace();
    fs::write(ws.path().join("ground_truth.json"), "{}").unwrap();
    provena()
        .current_dir(ws.path())
        .args(["validate", "--report", "absent.txt"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read report"));
}
