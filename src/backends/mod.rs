// SPDX-License-Identifier: GPL-3.0-only

//! Device session abstraction
//!
//! The scanner drives the sensor only through [`DeviceSession`]. Three
//! implementations exist:
//!
//! ```text
//! ┌─────────────────────┐
//! │   Scanner (loop)    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ DeviceSession trait │  ← tilt, LED, depth, shutdown
//! └──────────┬──────────┘
//!            │
//!     ┌──────┼───────────────┐
//!     ▼      ▼               ▼
//! Simulated  V4L2 kernel   freedepth USB
//! ```
//!
//! # Modules
//!
//! - [`motor_control`]: bounded motor waits shared by all backends
//! - [`simulated`]: deterministic in-process sensor
//! - [`v4l2_controls`]: raw V4L2 control ioctls
//! - [`v4l2_depth`]: kernel driver session
//! - `native`: freedepth session (feature `freedepth`)

pub mod motor_control;
#[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
pub mod native;
pub mod simulated;
pub mod types;
pub mod v4l2_controls;
pub mod v4l2_depth;

pub use types::*;

use tracing::info;

use crate::config::BackendKind;

/// Open hardware session used by the sweep loop
///
/// Implementations must release the device in [`DeviceSession::shutdown`]
/// and tolerate it being called more than once. They also shut down when
/// dropped, so an early return never leaves the device claimed.
pub trait DeviceSession: Send {
    /// Human readable name of the device behind this session
    fn name(&self) -> &str;

    /// Set the status LED
    ///
    /// Returns [`BackendError::NotSupported`] when the driver gives no LED access.
    fn set_led(&mut self, color: LedColor) -> BackendResult<()>;

    /// Command the motor to a tilt angle in degrees
    ///
    /// Returns as soon as the command is sent; use [`tilt_status`](Self::tilt_status)
    /// to find out when the motor stopped.
    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()>;

    /// Query the motor state
    fn tilt_status(&mut self) -> BackendResult<TiltStatus>;

    /// Block until one depth sample is available and return it
    fn read_depth_sample(&mut self) -> BackendResult<DepthSample>;

    /// Start delivering every depth frame to `callback`
    ///
    /// Frames are delivered one at a time from a single backend thread.
    fn start_depth_stream(&mut self, callback: DepthCallback) -> BackendResult<()>;

    /// Stop the depth stream and wait for the delivery thread to finish
    fn stop_depth_stream(&mut self) -> BackendResult<()>;

    /// Release the device
    fn shutdown(&mut self) -> BackendResult<()>;
}

/// Open a session for the configured backend
pub fn open_session(kind: &BackendKind) -> BackendResult<Box<dyn DeviceSession>> {
    info!(backend = ?kind, "Opening device session");

    match kind {
        BackendKind::Simulated => Ok(Box::new(simulated::SimulatedSession::new())),
        BackendKind::V4l2 { device_path } => {
            Ok(Box::new(v4l2_depth::KernelSession::open(device_path)?))
        }
        #[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
        BackendKind::Freedepth { index } => Ok(Box::new(native::NativeSession::open(*index)?)),
        #[cfg(not(all(target_arch = "x86_64", feature = "freedepth")))]
        BackendKind::Freedepth { .. } => Err(BackendError::InitializationFailed(
            "built without the freedepth feature".to_string(),
        )),
    }
}

/// Enumerate connected sensors on every available backend
pub fn list_devices() -> Vec<DeviceInfo> {
    #[allow(unused_mut)]
    let mut devices = v4l2_depth::enumerate_kinect_nodes();

    #[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
    devices.extend(native::enumerate_devices());

    devices
}
