use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use image::{Rgb, RgbImage};
use imgsense_utils::{
    config::{DEFAULT_CLASSIFIER_MODEL, DEFAULT_LABELS},
    fixture_path,
};
use serde_json::Value;
use tempfile::tempdir;

fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(relative)
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_lists_both_commands() {
    let output = cargo_bin_cmd!("imgsense").arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("classify"));
    assert!(stdout.contains("detect-faces"));
}

#[test]
fn missing_labels_exit_with_failure_naming_the_path() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let labels = work_dir.path().join("labels.txt");

    let mut cmd = cargo_bin_cmd!("imgsense");
    cmd.current_dir(work_dir.path())
        .arg("classify")
        .arg("--labels")
        .arg(&labels);
    let output = cmd.output()?;

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr_of(&output).contains("labels.txt"),
        "stderr should name the label file: {}",
        stderr_of(&output)
    );
    Ok(())
}

#[test]
fn missing_model_exits_with_failure_naming_the_path() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let model = work_dir.path().join("absent_graph.pb");

    let mut cmd = cargo_bin_cmd!("imgsense");
    cmd.current_dir(work_dir.path())
        .arg("classify")
        .arg("--labels")
        .arg(fixture_path("labels/tiny_labels.txt")?)
        .arg("--model")
        .arg(&model);
    let output = cmd.output()?;

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("absent_graph.pb"));
    Ok(())
}

#[test]
fn corrupt_graph_fails_the_run() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let model = work_dir.path().join("graph.pb");
    fs::write(&model, b"definitely not a graph")?;
    let image = work_dir.path().join("jack.jpg");
    RgbImage::from_pixel(32, 32, Rgb([200, 120, 20])).save(&image)?;

    let mut cmd = cargo_bin_cmd!("imgsense");
    cmd.current_dir(work_dir.path())
        .arg("classify")
        .arg("--labels")
        .arg(fixture_path("labels/tiny_labels.txt")?)
        .arg("--model")
        .arg(&model);
    cmd.assert().failure().code(1);
    Ok(())
}

#[test]
fn missing_explicit_config_fails() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let mut cmd = cargo_bin_cmd!("imgsense");
    cmd.current_dir(work_dir.path())
        .arg("--config")
        .arg("nowhere/settings.json")
        .arg("classify");
    cmd.assert().failure().code(1);
    Ok(())
}

#[test]
fn unknown_resize_quality_is_a_usage_error() {
    let output = cargo_bin_cmd!("imgsense")
        .args(["classify", "--resize-quality", "blurry"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("blurry"));
}

/// Runs the Inception graph end to end when it has been downloaded into `models/`.
#[test]
fn inception_run_prints_report_and_writes_json() -> Result<(), Box<dyn Error>> {
    let model = workspace_path(DEFAULT_CLASSIFIER_MODEL);
    let labels = workspace_path(DEFAULT_LABELS);
    if !model.exists() || !labels.exists() {
        eprintln!("skipping: {} not present", model.display());
        return Ok(());
    }

    let work_dir = tempdir()?;
    let image = work_dir.path().join("sample.jpg");
    RgbImage::from_fn(96, 96, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 90])).save(&image)?;

    let base_args = |cmd: &mut assert_cmd::Command| {
        cmd.current_dir(work_dir.path())
            .arg("classify")
            .arg("--image")
            .arg(&image)
            .arg("--model")
            .arg(&model)
            .arg("--labels")
            .arg(&labels)
            .arg("--allow-unlabeled")
            .args(["-k", "3"]);
    };

    let mut cmd = cargo_bin_cmd!("imgsense");
    base_args(&mut cmd);
    let output = cmd.output()?;
    assert!(output.status.success(), "{}", stderr_of(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5, "unexpected report: {stdout}");
    assert!(lines[0].starts_with("BEST MATCH: "));
    assert!(lines[1..4].iter().all(|line| line.starts_with("TOP 3 BEST MATCHES: ")));
    assert!(lines[4].starts_with("Labeling result: "));

    let json_path = work_dir.path().join("report.json");
    let mut cmd = cargo_bin_cmd!("imgsense");
    base_args(&mut cmd);
    cmd.arg("--json").arg(&json_path);
    cmd.assert().success();

    let report: Value = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    assert_eq!(report["top_k"], 3);
    assert_eq!(report["top"].as_array().map(Vec::len), Some(3));
    assert_eq!(report["best"], report["top"][0]);
    Ok(())
}
