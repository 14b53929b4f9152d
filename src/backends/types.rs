// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for device sessions

use std::fmt;

/// Result type for device session operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by a device session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Driver or library context could not be initialized
    InitializationFailed(String),
    /// Device handle could not be acquired
    DeviceNotFound(String),
    /// No depth sample could be read
    DepthReadFailed(String),
    /// Motor did not report stopped in time, even after re-issuing the command
    MotionTimeout { target: i8, attempts: u32 },
    /// The backend has no way to perform this operation
    NotSupported(&'static str),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DepthReadFailed(msg) => write!(f, "Depth read failed: {}", msg),
            BackendError::MotionTimeout { target, attempts } => write!(
                f,
                "Motor did not reach {}° after {} attempt(s)",
                target, attempts
            ),
            BackendError::NotSupported(what) => write!(f, "Not supported: {}", what),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

/// Motor state as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltStatus {
    /// Motor reached its commanded angle
    Stopped,
    /// Motor stopped against a mechanical limit short of the target
    AtLimit,
    /// Motor still moving
    Moving,
}

impl TiltStatus {
    pub fn is_moving(self) -> bool {
        self == TiltStatus::Moving
    }
}

/// Status LED colors of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Off,
    Green,
}

/// One depth reading taken from the centre pixel of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthSample {
    /// Raw depth value (11-bit on the native backend, 10-bit on V4L2)
    pub value: u16,
    /// Frame sequence number reported by the driver
    pub sequence: u32,
}

/// Callback invoked once per delivered depth frame
pub type DepthCallback = Box<dyn FnMut(DepthSample) + Send + 'static>;

/// A sensor found during enumeration
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human readable device name
    pub name: String,
    /// Value to pass to `--device` / `--index`
    pub locator: String,
    /// Driver handling the device
    pub driver: &'static str,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.locator, self.driver)
    }
}
