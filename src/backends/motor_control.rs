// SPDX-License-Identifier: GPL-3.0-only

//! Motor moves with a bounded wait
//!
//! The sensor motor accepts a tilt command and then moves on its own. Callers
//! poll the tilt status until it stops. A physical motor can stall, so every
//! wait is bounded: after a timeout the command is re-issued, and after
//! `max_retries` re-issues the move fails with [`BackendError::MotionTimeout`].

use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use super::DeviceSession;
use super::types::{BackendError, BackendResult, TiltStatus};
use crate::config::MotionConfig;
use crate::constants::TILT_LIMIT_STABLE_READS;

/// Command a tilt and block until the motor stops
///
/// Returns the number of tilt commands that were issued.
pub fn move_to(
    session: &mut dyn DeviceSession,
    target: i8,
    motion: &MotionConfig,
) -> BackendResult<u32> {
    let attempts = motion.max_retries + 1;

    for attempt in 1..=attempts {
        session.set_tilt(target)?;

        if wait_until_stopped(session, motion)? {
            if attempt > 1 {
                debug!(target, attempt, "Motor stopped after re-issued tilt command");
            }
            return Ok(attempt);
        }

        warn!(
            target,
            attempt,
            timeout_ms = motion.timeout.as_millis() as u64,
            "Motor still moving after timeout"
        );
    }

    Err(BackendError::MotionTimeout { target, attempts })
}

/// Poll the tilt status until the motor is no longer moving
///
/// Returns `Ok(false)` if the timeout expired first.
pub fn wait_until_stopped(
    session: &mut dyn DeviceSession,
    motion: &MotionConfig,
) -> BackendResult<bool> {
    let start = Instant::now();

    loop {
        let status = session.tilt_status()?;
        if !status.is_moving() {
            if status == TiltStatus::AtLimit {
                debug!("Motor stopped at its mechanical limit");
            }
            return Ok(true);
        }

        if start.elapsed() >= motion.timeout {
            return Ok(false);
        }

        if !motion.poll_interval.is_zero() {
            thread::sleep(motion.poll_interval);
        }
    }
}

/// Clamp a tilt command to what a backend's hardware accepts
pub fn clamp_tilt(degrees: i8, min: i8, max: i8) -> i8 {
    let clamped = degrees.clamp(min, max);
    if clamped != degrees {
        debug!(requested = degrees, clamped, "Tilt command clamped to device range");
    }
    clamped
}

/// Derives a [`TiltStatus`] from plain angle readings
///
/// Used by backends whose driver reports only the current angle. The motor
/// counts as stopped once the reading equals the target. A reading that sits
/// on one of the device limits short of the target for several polls counts
/// as stopped at that limit. Anything else is still moving, so a stall in the
/// middle of the range runs into the motion timeout.
#[derive(Debug, Clone)]
pub struct TiltTracker {
    min: i8,
    max: i8,
    target: Option<i8>,
    last_reading: Option<i8>,
    unchanged_reads: u32,
}

impl TiltTracker {
    /// Tracker for a motor that moves between `min` and `max` degrees
    pub fn new(min: i8, max: i8) -> Self {
        Self {
            min,
            max,
            target: None,
            last_reading: None,
            unchanged_reads: 0,
        }
    }

    /// Record a new tilt command
    pub fn command(&mut self, target: i8) {
        self.target = Some(target);
        self.last_reading = None;
        self.unchanged_reads = 0;
    }

    /// Feed the latest angle reading and get the resulting status
    pub fn observe(&mut self, reading: i8) -> TiltStatus {
        let Some(target) = self.target else {
            return TiltStatus::Stopped;
        };

        if reading == target {
            return TiltStatus::Stopped;
        }

        if self.last_reading == Some(reading) {
            self.unchanged_reads += 1;
        } else {
            self.unchanged_reads = 0;
        }
        self.last_reading = Some(reading);

        let at_limit = (reading <= self.min && target < reading)
            || (reading >= self.max && target > reading);
        if at_limit && self.unchanged_reads >= TILT_LIMIT_STABLE_READS {
            TiltStatus::AtLimit
        } else {
            TiltStatus::Moving
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::{SimulatedOptions, SimulatedSession};
    use std::time::Duration;

    fn fast_motion(max_retries: u32) -> MotionConfig {
        MotionConfig {
            poll_interval: Duration::ZERO,
            timeout: Duration::from_millis(20),
            max_retries,
        }
    }

    fn simulated(options: SimulatedOptions) -> SimulatedSession {
        SimulatedSession::open(options).unwrap()
    }

    #[test]
    fn test_move_settles_on_first_command() {
        let mut session = simulated(SimulatedOptions::default());
        assert_eq!(move_to(&mut session, 7, &fast_motion(2)).unwrap(), 1);
        assert_eq!(session.motor_angle(), 7);
    }

    #[test]
    fn test_move_recovers_after_reissue() {
        let mut session = simulated(SimulatedOptions {
            stalled_commands: 1,
            ..SimulatedOptions::default()
        });
        let monitor = session.monitor();
        assert_eq!(move_to(&mut session, -12, &fast_motion(2)).unwrap(), 2);
        assert_eq!(monitor.tilt_commands(), vec![-12, -12]);
        assert_eq!(session.motor_angle(), -12);
    }

    #[test]
    fn test_move_gives_up_after_retries() {
        let mut session = simulated(SimulatedOptions {
            stalled_commands: 3,
            ..SimulatedOptions::default()
        });
        let result = move_to(&mut session, 4, &fast_motion(2));
        assert_eq!(
            result,
            Err(BackendError::MotionTimeout {
                target: 4,
                attempts: 3
            })
        );
    }

    #[test]
    fn test_wait_accepts_limit_stop() {
        let mut session = simulated(SimulatedOptions {
            tilt_range: (-27, 27),
            ..SimulatedOptions::default()
        });
        session.set_tilt(-30).unwrap();
        assert!(wait_until_stopped(&mut session, &fast_motion(0)).unwrap());
        assert_eq!(session.motor_angle(), -27);
    }

    #[test]
    fn test_tilt_clamping() {
        assert_eq!(clamp_tilt(30, -27, 27), 27);
        assert_eq!(clamp_tilt(-30, -27, 27), -27);
        assert_eq!(clamp_tilt(0, -27, 27), 0);
    }

    #[test]
    fn test_tracker_reaches_target() {
        let mut tracker = TiltTracker::new(-31, 31);
        tracker.command(10);
        assert_eq!(tracker.observe(2), TiltStatus::Moving);
        assert_eq!(tracker.observe(9), TiltStatus::Moving);
        assert_eq!(tracker.observe(10), TiltStatus::Stopped);
    }

    #[test]
    fn test_tracker_one_degree_step_waits_for_motor() {
        // A sweep step is one degree, the old reading is not arrival
        let mut tracker = TiltTracker::new(-31, 31);
        tracker.command(-30);
        assert_eq!(tracker.observe(-30), TiltStatus::Stopped);
        tracker.command(-29);
        assert_eq!(tracker.observe(-30), TiltStatus::Moving);
        assert_eq!(tracker.observe(-29), TiltStatus::Stopped);

        tracker.command(5);
        assert_eq!(tracker.observe(4), TiltStatus::Moving);
    }

    #[test]
    fn test_tracker_detects_limit() {
        let mut tracker = TiltTracker::new(-27, 27);
        tracker.command(30);
        let mut status = TiltStatus::Moving;
        for _ in 0..=TILT_LIMIT_STABLE_READS {
            status = tracker.observe(27);
        }
        assert_eq!(status, TiltStatus::AtLimit);
    }

    #[test]
    fn test_tracker_mid_range_stall_keeps_moving() {
        let mut tracker = TiltTracker::new(-31, 31);
        tracker.command(12);
        for _ in 0..(TILT_LIMIT_STABLE_READS * 4) {
            assert_eq!(tracker.observe(3), TiltStatus::Moving);
        }
    }

    #[test]
    fn test_tracker_without_command_is_stopped() {
        let mut tracker = TiltTracker::new(-31, 31);
        assert_eq!(tracker.observe(-12), TiltStatus::Stopped);
    }
}
