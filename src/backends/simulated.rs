// SPDX-License-Identifier: GPL-3.0-only

//! Simulated sensor
//!
//! Runs the full sweep without hardware. The motor reports `Moving` for a
//! fixed number of status polls after every command, then settles exactly on
//! the target. Depth values follow a synthetic profile of the motor angle so
//! logs look plausible and tests stay deterministic.
//!
//! Failures can be injected through [`SimulatedOptions`], and a
//! [`SimulatedMonitor`] records what the scanner did to the device.

use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use super::DeviceSession;
use super::types::*;
use crate::constants::{DEPTH_11BIT_MAX, DEPTH_FRAME_INTERVAL, INITIAL_TILT_DEGREES};

/// Behaviour of a simulated sensor
#[derive(Debug, Clone)]
pub struct SimulatedOptions {
    /// Status polls that report `Moving` after each tilt command
    pub moving_polls: u32,
    /// Motor never stops moving
    pub stall_motor: bool,
    /// The first this many tilt commands stall until the command is re-issued
    pub stalled_commands: u32,
    /// Mechanical range; commands beyond it stop at the limit
    pub tilt_range: (i8, i8),
    /// Opening the session fails
    pub fail_open: bool,
    /// Every depth read fails
    pub fail_depth_reads: bool,
    /// The depth stream dies right after it starts
    pub fail_stream: bool,
    /// Delay between streamed frames
    pub frame_interval: Duration,
}

impl Default for SimulatedOptions {
    fn default() -> Self {
        Self {
            moving_polls: 2,
            stall_motor: false,
            stalled_commands: 0,
            tilt_range: (-31, 31),
            fail_open: false,
            fail_depth_reads: false,
            fail_stream: false,
            frame_interval: DEPTH_FRAME_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    tilt_commands: Vec<i8>,
    led: Option<LedColor>,
    shutdown_calls: u32,
    frames_delivered: u64,
}

/// Read-only view of what happened to a simulated sensor
///
/// Stays valid after the session itself was dropped.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl SimulatedMonitor {
    /// Every tilt command received, in order
    pub fn tilt_commands(&self) -> Vec<i8> {
        self.with(|s| s.tilt_commands.clone())
    }

    /// Last LED color set
    pub fn led(&self) -> Option<LedColor> {
        self.with(|s| s.led)
    }

    /// Number of `shutdown` calls that actually released the device
    pub fn shutdown_calls(&self) -> u32 {
        self.with(|s| s.shutdown_calls)
    }

    /// Frames handed to stream callbacks
    pub fn frames_delivered(&self) -> u64 {
        self.with(|s| s.frames_delivered)
    }

    fn with<T>(&self, f: impl FnOnce(&mut MonitorState) -> T) -> T {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

struct StreamHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
    failed: bool,
}

/// In-process sensor implementing [`DeviceSession`]
pub struct SimulatedSession {
    options: SimulatedOptions,
    motor_angle: Arc<AtomicI8>,
    commanded: i8,
    commands_issued: u32,
    stalled: bool,
    remaining_moving_polls: u32,
    sequence: Arc<AtomicU32>,
    stream: Option<StreamHandle>,
    monitor: SimulatedMonitor,
    open: bool,
}

impl SimulatedSession {
    /// Simulated sensor with default behaviour
    pub fn new() -> Self {
        Self::build(SimulatedOptions::default())
    }

    /// Open a simulated sensor, honouring `fail_open`
    pub fn open(options: SimulatedOptions) -> BackendResult<Self> {
        if options.fail_open {
            return Err(BackendError::DeviceNotFound(
                "simulated sensor unplugged".to_string(),
            ));
        }
        Ok(Self::build(options))
    }

    fn build(options: SimulatedOptions) -> Self {
        info!(?options, "Opening simulated sensor");
        Self {
            options,
            motor_angle: Arc::new(AtomicI8::new(0)),
            commanded: 0,
            commands_issued: 0,
            stalled: false,
            remaining_moving_polls: 0,
            sequence: Arc::new(AtomicU32::new(0)),
            stream: None,
            monitor: SimulatedMonitor::default(),
            open: true,
        }
    }

    /// Handle for inspecting the device from tests
    pub fn monitor(&self) -> SimulatedMonitor {
        self.monitor.clone()
    }

    /// Angle the simulated motor is currently at
    pub fn motor_angle(&self) -> i8 {
        self.motor_angle.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::Other("simulated session is shut down".to_string()))
        }
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthetic raw depth for a tilt angle
///
/// A flat wall in front of the sensor: closest straight ahead, further away
/// the more the sensor tilts.
pub fn synthetic_depth(angle: i8) -> u16 {
    let offset = u16::from(angle.unsigned_abs());
    (600 + offset * offset / 2).min(DEPTH_11BIT_MAX)
}

impl DeviceSession for SimulatedSession {
    fn name(&self) -> &str {
        "Simulated Kinect"
    }

    fn set_led(&mut self, color: LedColor) -> BackendResult<()> {
        self.ensure_open()?;
        self.monitor.with(|s| s.led = Some(color));
        Ok(())
    }

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()> {
        self.ensure_open()?;
        self.commanded = degrees;
        self.stalled = self.commands_issued < self.options.stalled_commands;
        self.commands_issued += 1;
        self.remaining_moving_polls = self.options.moving_polls;
        self.monitor.with(|s| s.tilt_commands.push(degrees));
        Ok(())
    }

    fn tilt_status(&mut self) -> BackendResult<TiltStatus> {
        self.ensure_open()?;
        if self.options.stall_motor || self.stalled {
            return Ok(TiltStatus::Moving);
        }
        if self.remaining_moving_polls > 0 {
            self.remaining_moving_polls -= 1;
            return Ok(TiltStatus::Moving);
        }

        let (min, max) = self.options.tilt_range;
        let reached = self.commanded.clamp(min, max);
        self.motor_angle.store(reached, Ordering::SeqCst);
        if reached == self.commanded {
            Ok(TiltStatus::Stopped)
        } else {
            Ok(TiltStatus::AtLimit)
        }
    }

    fn read_depth_sample(&mut self) -> BackendResult<DepthSample> {
        self.ensure_open()?;
        if self.options.fail_depth_reads {
            return Err(BackendError::DepthReadFailed(
                "simulated read error".to_string(),
            ));
        }
        Ok(DepthSample {
            value: synthetic_depth(self.motor_angle()),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn start_depth_stream(&mut self, mut callback: DepthCallback) -> BackendResult<()> {
        self.ensure_open()?;
        if self.stream.is_some() {
            return Err(BackendError::Other("depth stream already running".to_string()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let motor_angle = Arc::clone(&self.motor_angle);
        let sequence = Arc::clone(&self.sequence);
        let monitor = self.monitor.clone();
        let interval = self.options.frame_interval;
        let failed = self.options.fail_stream;

        let thread = thread::spawn(move || {
            if failed {
                debug!("Simulated depth stream lost");
                return;
            }
            // First frame goes out before the running check so every stream delivers at least one
            loop {
                let sample = DepthSample {
                    value: synthetic_depth(motor_angle.load(Ordering::SeqCst)),
                    sequence: sequence.fetch_add(1, Ordering::SeqCst),
                };
                callback(sample);
                monitor.with(|s| s.frames_delivered += 1);

                thread::sleep(interval);
                if !thread_running.load(Ordering::SeqCst) {
                    break;
                }
            }
            debug!("Simulated depth stream ended");
        });

        self.stream = Some(StreamHandle {
            running,
            thread,
            failed,
        });
        debug!("Simulated depth stream started");
        Ok(())
    }

    fn stop_depth_stream(&mut self) -> BackendResult<()> {
        if let Some(stream) = self.stream.take() {
            stream.running.store(false, Ordering::SeqCst);
            stream
                .thread
                .join()
                .map_err(|_| BackendError::Other("depth stream thread panicked".to_string()))?;
            if stream.failed {
                return Err(BackendError::DepthReadFailed(
                    "simulated depth stream lost".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        if !self.open {
            return Ok(());
        }
        let stopped = self.stop_depth_stream();
        self.open = false;
        self.monitor.with(|s| s.shutdown_calls += 1);
        info!(
            parked_at = self.motor_angle(),
            initial = INITIAL_TILT_DEGREES,
            "Simulated sensor released"
        );
        stopped
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_settles_after_moving_polls() {
        let mut session = SimulatedSession::new();
        session.set_tilt(12).unwrap();
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::Moving);
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::Moving);
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::Stopped);
        assert_eq!(session.motor_angle(), 12);
    }

    #[test]
    fn test_command_beyond_range_stops_at_limit() {
        let mut session = SimulatedSession::open(SimulatedOptions {
            moving_polls: 0,
            tilt_range: (-27, 27),
            ..SimulatedOptions::default()
        })
        .unwrap();
        session.set_tilt(30).unwrap();
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::AtLimit);
        assert_eq!(session.motor_angle(), 27);
    }

    #[test]
    fn test_stalled_command_recovers_on_reissue() {
        let mut session = SimulatedSession::open(SimulatedOptions {
            moving_polls: 0,
            stalled_commands: 1,
            ..SimulatedOptions::default()
        })
        .unwrap();
        session.set_tilt(5).unwrap();
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::Moving);
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::Moving);
        session.set_tilt(5).unwrap();
        assert_eq!(session.tilt_status().unwrap(), TiltStatus::Stopped);
    }

    #[test]
    fn test_lost_stream_fails_on_stop() {
        let mut session = SimulatedSession::open(SimulatedOptions {
            fail_stream: true,
            ..SimulatedOptions::default()
        })
        .unwrap();
        session.start_depth_stream(Box::new(|_| {})).unwrap();
        assert!(matches!(
            session.stop_depth_stream(),
            Err(BackendError::DepthReadFailed(_))
        ));
        assert_eq!(session.monitor().frames_delivered(), 0);
    }

    #[test]
    fn test_synthetic_depth_is_symmetric() {
        assert_eq!(synthetic_depth(0), 600);
        assert_eq!(synthetic_depth(-20), synthetic_depth(20));
        assert!(synthetic_depth(30) > synthetic_depth(10));
        assert!(synthetic_depth(i8::MIN) <= DEPTH_11BIT_MAX);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut session = SimulatedSession::new();
        let monitor = session.monitor();
        session.shutdown().unwrap();
        session.shutdown().unwrap();
        drop(session);
        assert_eq!(monitor.shutdown_calls(), 1);
    }

    #[test]
    fn test_closed_session_rejects_commands() {
        let mut session = SimulatedSession::new();
        session.shutdown().unwrap();
        assert!(session.set_tilt(0).is_err());
        assert!(session.read_depth_sample().is_err());
    }

    #[test]
    fn test_fail_open() {
        let options = SimulatedOptions {
            fail_open: true,
            ..SimulatedOptions::default()
        };
        assert!(matches!(
            SimulatedSession::open(options),
            Err(BackendError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_stream_delivers_frames() {
        let mut session = SimulatedSession::open(SimulatedOptions {
            frame_interval: Duration::from_millis(1),
            ..SimulatedOptions::default()
        })
        .unwrap();
        let received = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&received);
        session
            .start_depth_stream(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        session.stop_depth_stream().unwrap();
        let delivered = received.load(Ordering::SeqCst);
        assert!(delivered >= 1);
        assert_eq!(u64::from(delivered), session.monitor().frames_delivered());
    }
}
