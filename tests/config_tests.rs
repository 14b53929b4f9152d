// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use linear_scanner::config::MotionConfig;
use linear_scanner::constants::{DEFAULT_LOG_FILE, MOTION_MAX_RETRIES, MOTION_TIMEOUT};
use linear_scanner::{AcquisitionMode, BackendKind, SweepConfig};
use std::path::PathBuf;

#[test]
fn test_config_default() {
    // Default run is a polled sweep on the kernel driver
    let config = SweepConfig::default();

    assert_eq!(config.mode, AcquisitionMode::Polled);
    assert_eq!(config.half_cycles, 1);
    assert_eq!(config.output, PathBuf::from(DEFAULT_LOG_FILE));
    assert_eq!(
        config.backend,
        BackendKind::V4l2 {
            device_path: "/dev/video0".to_string()
        }
    );
    assert!(config.print_progress, "Progress should print by default");
}

#[test]
fn test_mode_thresholds() {
    assert_eq!(SweepConfig::for_mode(AcquisitionMode::Polled).half_cycles, 1);
    assert_eq!(SweepConfig::for_mode(AcquisitionMode::Streamed).half_cycles, 3);
}

#[test]
fn test_motion_defaults() {
    let motion = MotionConfig::default();
    assert_eq!(motion.timeout, MOTION_TIMEOUT);
    assert_eq!(motion.max_retries, MOTION_MAX_RETRIES);
    assert!(motion.poll_interval < motion.timeout);
}

#[test]
fn test_config_serializes() {
    // The CLI logs the configuration as JSON
    let config = SweepConfig::for_mode(AcquisitionMode::Streamed);
    let json = serde_json::to_value(&config).unwrap();

    assert_eq!(json["mode"], "Streamed");
    assert_eq!(json["half_cycles"], 3);
    assert_eq!(json["backend"]["V4l2"]["device_path"], "/dev/video0");
}
