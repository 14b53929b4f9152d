// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use linear_scanner::constants::*;

#[test]
fn test_center_pixel_index() {
    // (640/2 - 1) + (480/2 - 1) * 640
    assert_eq!(CENTER_PIXEL_INDEX, 153279);
    assert!(CENTER_PIXEL_INDEX < (DEPTH_WIDTH * DEPTH_HEIGHT) as usize);
}

#[test]
fn test_tilt_range() {
    assert_eq!(TILT_MIN_DEGREES, -30);
    assert_eq!(TILT_MAX_DEGREES, 30);
    assert_eq!(INITIAL_TILT_DEGREES, TILT_MIN_DEGREES);
}

#[test]
fn test_half_cycle_thresholds() {
    assert_eq!(POLLED_HALF_CYCLES, 1);
    assert_eq!(STREAMED_HALF_CYCLES, 3);
}

#[test]
fn test_log_header() {
    assert_eq!(LOG_HEADER, "index,depth_value,angle,direction");
    assert_eq!(DEFAULT_LOG_FILE, "linear_scanner.txt");
}

#[test]
fn test_motion_timing() {
    // Motor poll period is 10 ms, and a stalled move must give up eventually
    assert_eq!(MOTION_POLL_INTERVAL.as_millis(), 10);
    assert!(MOTION_TIMEOUT > MOTION_POLL_INTERVAL);
    assert!(MOTION_MAX_RETRIES > 0);
}
