//! Command-line contract for the perdiem binaries.
//!
//! The predictor promises a single two-decimal line on stdout on success and
//! an empty stdout on every failure; the batch runner promises one line per
//! input record in input order. Both are exercised against real processes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use perdiem::ml::features::{FEATURE_LEN, FEATURE_VERSION, TripInput, feature_row};
use perdiem::ml::gbrt::{TrainDataset, TrainOptions, train_gbrt};
use tempfile::tempdir;

const SCENARIO_CASES: &str = r#"[
  {"input": {"trip_duration_days": 1, "miles_traveled": 50, "total_receipts_amount": 10.0}, "expected_output": 45.0},
  {"input": {"trip_duration_days": 3, "miles_traveled": 200, "total_receipts_amount": 80.0}, "expected_output": 310.0}
]"#;

fn write_model(dir: &Path) -> PathBuf {
    let cases = [
        (TripInput::new(1.0, 50.0, 10.0), 45.0f32),
        (TripInput::new(3.0, 200.0, 80.0), 310.0f32),
    ];
    let dataset = TrainDataset {
        feature_len: FEATURE_LEN,
        feature_version: FEATURE_VERSION,
        x: cases.iter().map(|(input, _)| feature_row(input)).collect(),
        y: cases.iter().map(|(_, label)| *label).collect(),
    };
    let options = TrainOptions {
        rounds: 200,
        learning_rate: 0.1,
        max_depth: 2,
        bins: 16,
        min_leaf: 1,
    };
    let model = train_gbrt(&dataset, &options).unwrap();
    let path = dir.join("model.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&model).unwrap()).unwrap();
    path
}

fn run_bin(exe: &str, args: &[&str], config_home: &Path) -> Output {
    Command::new(exe)
        .args(args)
        .env("PERDIEM_CONFIG_HOME", config_home)
        .output()
        .expect("binary should spawn")
}

fn assert_two_decimal_line(stdout: &[u8]) -> f64 {
    let text = String::from_utf8(stdout.to_vec()).unwrap();
    let line = text.strip_suffix('\n').expect("trailing newline");
    assert!(!line.contains('\n'), "expected a single line: {text:?}");
    let (_, fraction) = line.split_once('.').expect("decimal point");
    assert_eq!(fraction.len(), 2, "expected two decimals: {line:?}");
    line.parse::<f64>().expect("numeric output")
}

#[test]
fn predict_prints_one_two_decimal_line() {
    let dir = tempdir().unwrap();
    let model = write_model(dir.path());
    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-predict"),
        &[
            "--model",
            model.to_str().unwrap(),
            "1",
            "50",
            "10.00",
        ],
        dir.path(),
    );
    assert!(output.status.success());
    let value = assert_two_decimal_line(&output.stdout);
    assert!((value - 45.0).abs() < 1.0, "got {value}");
}

#[test]
fn predict_is_deterministic() {
    let dir = tempdir().unwrap();
    let model = write_model(dir.path());
    let args = ["--model", model.to_str().unwrap(), "3", "200", "80"];
    let first = run_bin(env!("CARGO_BIN_EXE_perdiem-predict"), &args, dir.path());
    let second = run_bin(env!("CARGO_BIN_EXE_perdiem-predict"), &args, dir.path());
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn predict_rejects_non_numeric_argument() {
    let dir = tempdir().unwrap();
    let model = write_model(dir.path());
    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-predict"),
        &["--model", model.to_str().unwrap(), "a", "50", "10"],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "stdout must stay empty on failure");
    assert!(!output.stderr.is_empty());
}

#[test]
fn predict_rejects_wrong_arity() {
    let dir = tempdir().unwrap();
    let model = write_model(dir.path());
    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-predict"),
        &["--model", model.to_str().unwrap(), "1", "50"],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn predict_fails_cleanly_without_artifact() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-predict"),
        &["--model", missing.to_str().unwrap(), "1", "50", "10"],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!output.stderr.is_empty());
}

#[test]
fn train_writes_a_loadable_artifact() {
    let dir = tempdir().unwrap();
    let cases_path = dir.path().join("cases.json");
    write_synthetic_cases(&cases_path);
    let model_path = dir.path().join("model.json");

    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-train"),
        &[
            "--dataset",
            cases_path.to_str().unwrap(),
            "--out",
            model_path.to_str().unwrap(),
            "--rounds",
            "80",
            "--learning-rate",
            "0.1",
            "--max-depth",
            "3",
            "--bins",
            "16",
            "--min-leaf",
            "1",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("training MAE"), "stdout: {stdout}");
    assert!(model_path.is_file());
    assert!(perdiem::ml::gbrt::GbrtModel::load_json(&model_path).is_ok());
}

#[test]
fn eval_reports_error_statistics() {
    let dir = tempdir().unwrap();
    let model = write_model(dir.path());
    let cases_path = dir.path().join("cases.json");
    std::fs::write(&cases_path, SCENARIO_CASES).unwrap();

    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-eval"),
        &[
            "--model",
            model.to_str().unwrap(),
            "--dataset",
            cases_path.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mean absolute error"), "stdout: {stdout}");
    assert!(stdout.contains("close matches"), "stdout: {stdout}");
}

#[test]
fn batch_preserves_record_order_and_count() {
    let dir = tempdir().unwrap();
    let model = write_model(dir.path());
    let cases_path = dir.path().join("cases.json");
    // Mixed labeled and unlabeled records; labels are ignored.
    std::fs::write(
        &cases_path,
        r#"[
  {"input": {"trip_duration_days": 1, "miles_traveled": 50, "total_receipts_amount": 10.0}, "expected_output": 45.0},
  {"input": {"trip_duration_days": 3, "miles_traveled": 200, "total_receipts_amount": 80.0}},
  {"input": {"trip_duration_days": 2, "miles_traveled": 120, "total_receipts_amount": 35.5}}
]"#,
    )
    .unwrap();
    let results_path = dir.path().join("results.txt");

    let output = run_bin(
        env!("CARGO_BIN_EXE_perdiem-batch"),
        &[
            "--model",
            model.to_str().unwrap(),
            "--cases",
            cases_path.to_str().unwrap(),
            "--out",
            results_path.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let results = std::fs::read_to_string(&results_path).unwrap();
    let lines: Vec<&str> = results.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in &lines {
        let (_, fraction) = line.split_once('.').expect("decimal point");
        assert_eq!(fraction.len(), 2);
        line.parse::<f64>().unwrap();
    }
    // First record matches the single-prediction path.
    let single = run_bin(
        env!("CARGO_BIN_EXE_perdiem-predict"),
        &["--model", model.to_str().unwrap(), "1", "50", "10.0"],
        dir.path(),
    );
    assert_eq!(
        lines[0],
        String::from_utf8_lossy(&single.stdout).trim_end_matches('\n')
    );
}

fn write_synthetic_cases(path: &Path) {
    let mut records = Vec::new();
    for days in 1..=3 {
        for miles in [50.0f64, 150.0, 300.0, 600.0] {
            let receipts = 40.0 * days as f64 + miles * 0.1;
            let expected = 90.0 * days as f64 + 0.5 * miles + 0.4 * receipts;
            records.push(serde_json::json!({
                "input": {
                    "trip_duration_days": days,
                    "miles_traveled": miles,
                    "total_receipts_amount": receipts,
                },
                "expected_output": (expected * 100.0).round() / 100.0,
            }));
        }
    }
    std::fs::write(path, serde_json::to_vec_pretty(&records).unwrap()).unwrap();
}
