// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use std::fmt;
use std::path::PathBuf;

use crate::backends::BackendError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Device session errors (open, tilt, depth)
    Device(BackendError),
    /// Sample log errors
    Log(LogError),
    /// Invalid command line or configuration
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Sample log errors
#[derive(Debug, Clone)]
pub enum LogError {
    /// Log file could not be created or opened
    Create { path: PathBuf, message: String },
    /// A row could not be written
    Write { path: PathBuf, message: String },
    /// Log file could not be read back
    Read { path: PathBuf, message: String },
    /// A line of the log is not a valid row
    Parse { line: usize, message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Device(e) => write!(f, "Device error: {}", e),
            AppError::Log(e) => write!(f, "Log error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Create { path, message } => {
                write!(f, "Failed to open {}: {}", path.display(), message)
            }
            LogError::Write { path, message } => {
                write!(f, "Failed to write {}: {}", path.display(), message)
            }
            LogError::Read { path, message } => {
                write!(f, "Failed to read {}: {}", path.display(), message)
            }
            LogError::Parse { line, message } => write!(f, "Line {}: {}", line, message),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for LogError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Device(err)
    }
}

impl From<LogError> for AppError {
    fn from(err: LogError) -> Self {
        AppError::Log(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_source() {
        let err = AppError::from(BackendError::DeviceNotFound("/dev/video9".to_string()));
        assert_eq!(err.to_string(), "Device error: Device not found: /dev/video9");

        let err = AppError::from(LogError::Parse {
            line: 3,
            message: "expected 4 fields".to_string(),
        });
        assert_eq!(err.to_string(), "Log error: Line 3: expected 4 fields");
    }
}
