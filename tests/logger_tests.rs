// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the sample log

use linear_scanner::backends::DepthSample;
use linear_scanner::backends::simulated::SimulatedSession;
use linear_scanner::config::MotionConfig;
use linear_scanner::logger::{LogSummary, SampleLogger, read_rows};
use linear_scanner::sweep::SweepSnapshot;
use linear_scanner::{AcquisitionMode, BackendKind, Direction, SweepConfig, scanner};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

#[test]
fn test_summary_of_polled_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.txt");

    let mut config = SweepConfig::for_mode(AcquisitionMode::Polled);
    config.backend = BackendKind::Simulated;
    config.output = path.clone();
    config.print_progress = false;
    config.motion = MotionConfig {
        poll_interval: Duration::ZERO,
        ..MotionConfig::default()
    };

    let mut session = SimulatedSession::new();
    scanner::run(&mut session, &config, &AtomicBool::new(false)).unwrap();

    let summary = LogSummary::from_rows(&read_rows(&path).unwrap());
    assert_eq!(summary.rows, 61);
    assert_eq!(summary.runs, 1);
    assert_eq!(summary.min_angle, Some(-29));
    assert_eq!(summary.max_angle, Some(30));
    assert_eq!(summary.rows_up, 60);
    assert_eq!(summary.rows_down, 1);
}

#[test]
fn test_summary_json() {
    // `inspect --json` output
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.txt");
    let mut logger = SampleLogger::new(&path);
    let sample = DepthSample {
        value: 800,
        sequence: 0,
    };
    logger
        .append(
            sample,
            SweepSnapshot {
                angle: 4,
                direction: Direction::Down,
            },
        )
        .unwrap();

    let summary = LogSummary::from_rows(&read_rows(&path).unwrap());
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["rows"], 1);
    assert_eq!(json["rows_down"], 1);
    assert_eq!(json["min_angle"], 4);
    assert_eq!(json["mean_depth"], 800.0);
}

#[test]
fn test_missing_log_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_rows(&dir.path().join("absent.txt"));
    assert!(result.is_err());
}

#[test]
fn test_blank_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.txt");
    std::fs::write(&path, "index,depth_value,angle,direction\n\n0,640,-5,0\n\n1,641,-4,0").unwrap();

    let rows = read_rows(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].depth_value, 641);
}
