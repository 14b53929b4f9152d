// SPDX-License-Identifier: GPL-3.0-only

//! Sweep configuration
//!
//! Everything here is derived from [`crate::constants`]; the command line can
//! only choose the acquisition mode, the backend and where the log goes.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

/// How depth samples reach the logger
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum AcquisitionMode {
    /// Pull one sample per tilt step
    #[default]
    Polled,
    /// Log every frame the driver delivers while the motor sweeps
    Streamed,
}

impl AcquisitionMode {
    /// Half-cycles swept before the run ends
    pub fn half_cycles(self) -> u32 {
        match self {
            AcquisitionMode::Polled => constants::POLLED_HALF_CYCLES,
            AcquisitionMode::Streamed => constants::STREAMED_HALF_CYCLES,
        }
    }
}

/// Which device session implementation to open
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum BackendKind {
    /// In-process simulated sensor
    Simulated,
    /// Kernel gspca_kinect driver through V4L2
    V4l2 {
        /// Depth capture node, e.g. `/dev/video1`
        device_path: String,
    },
    /// freedepth userspace USB driver
    Freedepth {
        /// freedepth device index
        index: usize,
    },
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::V4l2 {
            device_path: "/dev/video0".to_string(),
        }
    }
}

/// Motor wait settings
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct MotionConfig {
    /// Delay between tilt status queries
    pub poll_interval: Duration,
    /// Maximum wait per tilt command
    pub timeout: Duration,
    /// Extra tilt commands after a timed-out wait
    pub max_retries: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            poll_interval: constants::MOTION_POLL_INTERVAL,
            timeout: constants::MOTION_TIMEOUT,
            max_retries: constants::MOTION_MAX_RETRIES,
        }
    }
}

/// Complete settings for one sweep run
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SweepConfig {
    pub mode: AcquisitionMode,
    /// Half-cycles before stopping (follows `mode` unless overridden in code)
    pub half_cycles: u32,
    /// Log file path
    pub output: PathBuf,
    pub backend: BackendKind,
    pub motion: MotionConfig,
    /// Print one progress line per logged row
    pub print_progress: bool,
}

impl SweepConfig {
    /// Default configuration for a mode
    pub fn for_mode(mode: AcquisitionMode) -> Self {
        Self {
            mode,
            half_cycles: mode.half_cycles(),
            ..Self::default()
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        let mode = AcquisitionMode::default();
        Self {
            mode,
            half_cycles: mode.half_cycles(),
            output: PathBuf::from(constants::DEFAULT_LOG_FILE),
            backend: BackendKind::default(),
            motion: MotionConfig::default(),
            print_progress: true,
        }
    }
}
