// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! The sweep range, thresholds and timings are compiled in. Only the
//! acquisition mode, backend and log path can be picked at runtime.

use std::time::Duration;

// ===== Tilt range =====

/// Lowest tilt angle of the sweep (degrees)
pub const TILT_MIN_DEGREES: i8 = -30;
/// Highest tilt angle of the sweep (degrees)
pub const TILT_MAX_DEGREES: i8 = 30;
/// Angle the motor is parked at before the sweep starts
pub const INITIAL_TILT_DEGREES: i8 = TILT_MIN_DEGREES;

/// Half-cycles swept in polled mode (-30 up to +30)
pub const POLLED_HALF_CYCLES: u32 = 1;
/// Half-cycles swept in streamed mode (-30 → +30 → -30 → +30)
pub const STREAMED_HALF_CYCLES: u32 = 3;

// ===== Depth frame geometry =====

/// Depth frame width in pixels
pub const DEPTH_WIDTH: u32 = 640;
/// Depth frame height in pixels
pub const DEPTH_HEIGHT: u32 = 480;
/// Row-major index of the pixel sampled from every depth frame
pub const CENTER_PIXEL_INDEX: usize =
    ((DEPTH_WIDTH / 2 - 1) + (DEPTH_HEIGHT / 2 - 1) * DEPTH_WIDTH) as usize;
/// Largest raw value of the 11-bit depth stream
pub const DEPTH_11BIT_MAX: u16 = 2047;

// ===== Log file =====

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "linear_scanner.txt";
/// First line written to a freshly created log file
pub const LOG_HEADER: &str = "index,depth_value,angle,direction";

// ===== Motor timing =====

/// Delay between two tilt status queries
pub const MOTION_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long a single tilt command may take before it counts as stalled
pub const MOTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Extra tilt commands issued after a stalled wait before giving up
pub const MOTION_MAX_RETRIES: u32 = 2;
/// Consecutive unchanged readings on a device limit that mean the motor hit its stop
pub const TILT_LIMIT_STABLE_READS: u32 = 5;

// ===== Depth acquisition =====

/// How long a polled depth read waits for the next frame
pub const DEPTH_READ_TIMEOUT: Duration = Duration::from_secs(2);
/// Frame interval of the depth stream (30 fps)
pub const DEPTH_FRAME_INTERVAL: Duration = Duration::from_millis(33);
/// Longest a V4L2 dequeue blocks before the capture thread rechecks its stop flag
pub const V4L2_DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);
/// Number of mmap buffers requested from the V4L2 driver
pub const V4L2_BUFFER_COUNT: u32 = 4;
