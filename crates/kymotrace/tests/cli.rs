//! End-to-end tests: run the `kymotrace` binary on synthetic images.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{GrayImage, Luma, Rgb, RgbImage};
use tempfile::TempDir;

/// Writes a constant kymograph and a single-stroke annotation into `dir`.
fn write_inputs(
    dir: &Path,
    width: u32,
    height: u32,
    stroke: impl Fn(u32, u32) -> bool,
) -> (PathBuf, PathBuf) {
    let kymograph = dir.join("kymograph.png");
    let lines = dir.join("lines.png");
    GrayImage::from_pixel(width, height, Luma([100]))
        .save(&kymograph)
        .unwrap();
    RgbImage::from_fn(width, height, |x, y| {
        if stroke(x, y) {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
    .save(&lines)
    .unwrap();
    (kymograph, lines)
}

fn kymotrace(kymograph: &Path, lines: &Path, out: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kymotrace"))
        .arg(kymograph)
        .arg(lines)
        .arg("--output-dir")
        .arg(out)
        .args(extra)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch kymotrace")
}

fn expected_series(rows: usize, suffix: &str) -> String {
    let mut header = String::from("time,intensity");
    header.push_str(if suffix.is_empty() { "" } else { ",series" });
    let mut text = format!("{header}\n");
    for t in 0..rows {
        text.push_str(&format!("{t},100{suffix}\n"));
    }
    text
}

#[test]
fn single_stroke_writes_both_csv_files() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) = write_inputs(dir.path(), 5, 10, |x, _| x == 2);
    let out = dir.path().join("out");

    let output = kymotrace(
        &kymograph,
        &lines,
        &out,
        &["--dilation", "2", "--reduce-method", "max"],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert_eq!(
        fs::read_to_string(out.join("series_00.csv")).unwrap(),
        expected_series(10, "")
    );
    assert_eq!(
        fs::read_to_string(out.join("all_series.csv")).unwrap(),
        expected_series(10, ",0")
    );
    assert!(!out.join("series_01.csv").exists());
}

#[test]
fn columns_time_axis_handles_horizontal_stroke() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) = write_inputs(dir.path(), 10, 5, |_, y| y == 3);
    let out = dir.path().join("out");

    let output = kymotrace(&kymograph, &lines, &out, &["--time-axis", "columns"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(out.join("series_00.csv")).unwrap(),
        expected_series(10, "")
    );
}

#[test]
fn columns_time_axis_keeps_neighbouring_strokes_apart() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) = write_inputs(dir.path(), 30, 12, |x, y| {
        (y == 3 || y == 5) && (2..28).contains(&x)
    });
    let out = dir.path().join("out");
    let mask = dir.path().join("mask.png");

    let output = kymotrace(
        &kymograph,
        &lines,
        &out,
        &[
            "--time-axis",
            "columns",
            "--dilation",
            "3",
            "--save-mask",
            mask.to_str().unwrap(),
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(out.join("series_00.csv").exists());
    assert!(out.join("series_01.csv").exists());
    assert!(!out.join("series_02.csv").exists());

    let saved = image::open(&mask).unwrap().to_luma8();
    assert_eq!(saved.dimensions(), (30, 12));
    assert!(saved.enumerate_pixels().all(|(_, y, p)| p.0[0] == 0 || y == 3 || y == 5));
    assert_eq!(saved.get_pixel(10, 4).0[0], 0);
}

#[test]
fn unknown_reduce_method_fails_without_writing() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) = write_inputs(dir.path(), 5, 10, |x, _| x == 2);
    let out = dir.path().join("out");

    let output = kymotrace(&kymograph, &lines, &out, &["--reduce-method", "median"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("median"));
    assert!(!out.exists());
}

#[test]
fn missing_input_fails_with_path_in_message() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.png");
    let out = dir.path().join("out");

    let output = kymotrace(&missing, &missing, &out, &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.png"));
    assert!(!out.exists());
}

#[test]
fn blank_annotation_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) = write_inputs(dir.path(), 8, 8, |_, _| false);
    let out = dir.path().join("out");

    let output = kymotrace(&kymograph, &lines, &out, &[]);
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(out.join("all_series.csv")).unwrap(),
        "time,intensity,series\n"
    );
    assert!(!out.join("series_00.csv").exists());
}

#[test]
fn rerun_output_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) =
        write_inputs(dir.path(), 12, 16, |x, y| x == 2 || (x == 9 && y > 3));
    let first = dir.path().join("first");
    let second = dir.path().join("second");

    assert!(kymotrace(&kymograph, &lines, &first, &[]).status.success());
    assert!(kymotrace(&kymograph, &lines, &second, &[]).status.success());

    for name in ["all_series.csv", "series_00.csv", "series_01.csv"] {
        assert_eq!(
            fs::read(first.join(name)).unwrap(),
            fs::read(second.join(name)).unwrap(),
            "{name} differs"
        );
    }
}

#[test]
fn save_mask_and_json_diagnostics() {
    let dir = TempDir::new().unwrap();
    let (kymograph, lines) = write_inputs(dir.path(), 5, 10, |x, _| x == 2);
    let out = dir.path().join("out");
    let mask = dir.path().join("mask.png");

    let output = kymotrace(
        &kymograph,
        &lines,
        &out,
        &["--save-mask", mask.to_str().unwrap(), "--json"],
    );
    assert!(output.status.success());

    let saved = image::open(&mask).unwrap().to_luma8();
    assert_eq!(saved.dimensions(), (5, 10));
    assert_eq!(saved.get_pixel(2, 0).0[0], 255);

    let stderr = String::from_utf8(output.stderr).unwrap();
    let json: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert_eq!(json["summary"]["line_count"], 1);
}
