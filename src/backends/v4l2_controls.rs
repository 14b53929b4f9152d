// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 control interface
//!
//! Raw `VIDIOC_*_CTRL` ioctls for the motor controls the kernel Kinect
//! driver exposes on its capture node.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

use super::types::{BackendError, BackendResult};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

// ===== V4L2 Control IDs (Camera Class) =====

/// Absolute tilt angle (degrees on the Kinect driver)
pub const V4L2_CID_TILT_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 9;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr
// where dir: 2=READ, 1=WRITE, 3=READ|WRITE

/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Range and state of a V4L2 control
#[derive(Debug, Clone)]
pub struct ControlRange {
    pub minimum: i32,
    pub maximum: i32,
    pub flags: u32,
}

impl ControlRange {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }
}

/// Query a control's range, `None` if the device does not have it
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlRange> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };
    if result < 0 {
        return None;
    }

    Some(ControlRange {
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        flags: qctrl.flags,
    })
}

/// Check if a control is available on the device
pub fn has_control(device_path: &str, control_id: u32) -> bool {
    query_control(device_path, control_id)
        .map(|info| !info.is_disabled())
        .unwrap_or(false)
}

/// Get current value of a control
pub fn get_control(device_path: &str, control_id: u32) -> BackendResult<i32> {
    let file = File::open(device_path)?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        debug!(device_path, control_id, ?errno, "Failed to get V4L2 control");
        return Err(BackendError::IoError(format!(
            "Failed to get control {:#x}: {}",
            control_id, errno
        )));
    }

    Ok(ctrl.value)
}

/// Set value of a control
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> BackendResult<()> {
    let file = File::open(device_path)?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(device_path, control_id, value, ?errno, "Failed to set V4L2 control");
        return Err(BackendError::IoError(format!(
            "Failed to set control {:#x}: {}",
            control_id, errno
        )));
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}
