// SPDX-License-Identifier: GPL-3.0-only

//! Linear Scanner - Kinect tilt sweep with depth sample logging
//!
//! Sweeps the Kinect motor one degree at a time between -30° and +30° and
//! logs the depth at the centre of the frame together with the tilt angle
//! and sweep direction.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Device session abstraction (simulated, V4L2, freedepth)
//! - [`sweep`]: Tilt sweep state machine
//! - [`logger`]: Flat sample log writer and reader
//! - [`scanner`]: Control loop for polled and streamed acquisition
//! - [`config`]: Run configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use linear_scanner::backends::simulated::SimulatedSession;
//! use linear_scanner::{SweepConfig, scanner};
//!
//! let mut session = SimulatedSession::new();
//! let config = SweepConfig::default();
//! let report = scanner::run(&mut session, &config, &AtomicBool::new(false))?;
//! println!("{} rows logged", report.rows_logged);
//! # Ok::<(), linear_scanner::AppError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logger;
pub mod scanner;
pub mod sweep;

// Re-export commonly used types
pub use config::{AcquisitionMode, BackendKind, SweepConfig};
pub use errors::{AppError, AppResult};
pub use scanner::SweepReport;
pub use sweep::{Direction, SweepController, SweepState};
