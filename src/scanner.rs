// SPDX-License-Identifier: GPL-3.0-only

//! Sweep control loop
//!
//! Ties a [`DeviceSession`], the [`SweepController`] and the [`SampleLogger`]
//! together. Two acquisition modes exist:
//!
//! - **Polled**: one depth read per tilt step, logged against the state the
//!   step produced.
//! - **Streamed**: the backend delivers every frame to a callback that logs
//!   it against the most recently published [`SweepSnapshot`], while the
//!   main loop keeps stepping the motor.
//!
//! [`run`] releases the device on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::backends::motor_control::move_to;
use crate::backends::{BackendError, DepthCallback, DepthSample, DeviceSession, LedColor};
use crate::config::{AcquisitionMode, MotionConfig, SweepConfig};
use crate::constants::INITIAL_TILT_DEGREES;
use crate::errors::{AppError, AppResult, LogError};
use crate::logger::{LogRow, SampleLogger};
use crate::sweep::{SweepController, SweepSnapshot, SweepState};

/// Outcome of a finished or cancelled sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Sweep iterations executed
    pub steps: u32,
    /// Rows appended to the log during this run
    pub rows_logged: u64,
    /// Sweep state after the last iteration
    pub final_state: SweepState,
    /// The run was stopped by the cancel flag
    pub cancelled: bool,
}

/// Console line for one logged row
pub fn progress_line(row: &LogRow) -> String {
    format!(
        "Angle: ({}°) | Direction: ({}) | Depth: ({})",
        row.angle, row.direction, row.depth_value
    )
}

/// Park the motor at the start of the sweep and light the LED
pub fn prepare(session: &mut dyn DeviceSession, motion: &MotionConfig) -> AppResult<()> {
    info!(angle = INITIAL_TILT_DEGREES, device = session.name(), "Moving to start position");
    move_to(session, INITIAL_TILT_DEGREES, motion)?;

    match session.set_led(LedColor::Green) {
        Ok(()) => {}
        Err(BackendError::NotSupported(what)) => warn!("{} is not available", what),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// One depth read per tilt step
pub fn run_polled(
    session: &mut dyn DeviceSession,
    config: &SweepConfig,
    mut logger: SampleLogger,
    cancel: &AtomicBool,
) -> AppResult<SweepReport> {
    let mut controller = SweepController::new(config.half_cycles);
    let mut cancelled = false;

    while !controller.is_finished() {
        if cancel.load(Ordering::SeqCst) {
            cancelled = true;
            break;
        }

        let sample = session.read_depth_sample()?;
        let Some((state, target)) = controller.step() else {
            break;
        };

        let row = logger.append(sample, state.snapshot())?;
        if config.print_progress {
            println!("{}", progress_line(&row));
        }

        move_to(session, target, &config.motion)?;
    }

    Ok(SweepReport {
        steps: controller.steps(),
        rows_logged: logger.rows_written(),
        final_state: controller.state(),
        cancelled,
    })
}

/// Log every streamed frame while the motor sweeps
pub fn run_streamed(
    session: &mut dyn DeviceSession,
    config: &SweepConfig,
    logger: SampleLogger,
    cancel: &AtomicBool,
) -> AppResult<SweepReport> {
    let mut controller = SweepController::new(config.half_cycles);
    let snapshot: Arc<Mutex<SweepSnapshot>> = Arc::new(Mutex::new(controller.state().snapshot()));
    let logger = Arc::new(Mutex::new(logger));
    let failure: Arc<Mutex<Option<LogError>>> = Arc::new(Mutex::new(None));

    let callback: DepthCallback = {
        let snapshot = Arc::clone(&snapshot);
        let logger = Arc::clone(&logger);
        let failure = Arc::clone(&failure);
        let print_progress = config.print_progress;

        Box::new(move |sample: DepthSample| {
            let current = *snapshot.lock().unwrap_or_else(PoisonError::into_inner);
            let mut failure = failure.lock().unwrap_or_else(PoisonError::into_inner);
            if failure.is_some() {
                return;
            }

            let mut logger = logger.lock().unwrap_or_else(PoisonError::into_inner);
            match logger.append(sample, current) {
                Ok(row) if print_progress => println!("{}", progress_line(&row)),
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to log streamed sample");
                    *failure = Some(e);
                }
            }
        })
    };

    session.start_depth_stream(callback)?;
    debug!("Depth stream started");

    let take_failure = || {
        failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    };

    let mut cancelled = false;
    let mut sweep = || -> AppResult<()> {
        while !controller.is_finished() {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                return Ok(());
            }
            if let Some(e) = take_failure() {
                return Err(e.into());
            }

            let Some((state, target)) = controller.step() else {
                break;
            };
            *snapshot.lock().unwrap_or_else(PoisonError::into_inner) = state.snapshot();

            move_to(&mut *session, target, &config.motion)?;
        }
        Ok(())
    };
    let swept = sweep();

    let stopped = session.stop_depth_stream();
    debug!("Depth stream stopped");
    swept?;
    stopped?;
    if let Some(e) = take_failure() {
        return Err(e.into());
    }

    let rows_logged = logger
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .rows_written();

    Ok(SweepReport {
        steps: controller.steps(),
        rows_logged,
        final_state: controller.state(),
        cancelled,
    })
}

/// Run a complete sweep and release the device afterwards
///
/// The LED is switched off before release on every exit path.
pub fn run(
    session: &mut dyn DeviceSession,
    config: &SweepConfig,
    cancel: &AtomicBool,
) -> AppResult<SweepReport> {
    info!(
        mode = ?config.mode,
        half_cycles = config.half_cycles,
        output = %config.output.display(),
        "Starting sweep"
    );

    let result = prepare(&mut *session, &config.motion).and_then(|()| {
        let logger = SampleLogger::new(&config.output);
        match config.mode {
            AcquisitionMode::Polled => run_polled(&mut *session, config, logger, cancel),
            AcquisitionMode::Streamed => run_streamed(&mut *session, config, logger, cancel),
        }
    });

    if let Err(e) = session.set_led(LedColor::Off)
        && !matches!(e, BackendError::NotSupported(_))
    {
        warn!(error = %e, "Failed to turn the LED off");
    }
    let released = session.shutdown();

    match (result, released) {
        (Ok(report), Ok(())) => {
            info!(
                steps = report.steps,
                rows = report.rows_logged,
                cancelled = report.cancelled,
                "Sweep finished"
            );
            Ok(report)
        }
        (Ok(_), Err(e)) => Err(AppError::Device(e)),
        (Err(e), released) => {
            if let Err(shutdown_error) = released {
                warn!(error = %shutdown_error, "Failed to release device after error");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::{SimulatedOptions, SimulatedSession};
    use crate::sweep::Direction;
    use std::time::Duration;

    fn fast_motion() -> MotionConfig {
        MotionConfig {
            poll_interval: Duration::ZERO,
            timeout: Duration::from_millis(20),
            max_retries: 1,
        }
    }

    #[test]
    fn test_progress_line() {
        let row = LogRow {
            index: 0,
            depth_value: 712,
            angle: -29,
            direction: Direction::Up,
        };
        assert_eq!(
            progress_line(&row),
            "Angle: (-29°) | Direction: (up) | Depth: (712)"
        );
    }

    #[test]
    fn test_prepare_parks_motor_and_sets_led() {
        let mut session = SimulatedSession::new();
        let monitor = session.monitor();
        prepare(&mut session, &fast_motion()).unwrap();
        assert_eq!(monitor.tilt_commands(), vec![INITIAL_TILT_DEGREES]);
        assert_eq!(monitor.led(), Some(LedColor::Green));
        assert_eq!(session.motor_angle(), INITIAL_TILT_DEGREES);
    }

    #[test]
    fn test_prepare_fails_on_stalled_motor() {
        let mut session = SimulatedSession::open(SimulatedOptions {
            stall_motor: true,
            ..SimulatedOptions::default()
        })
        .unwrap();
        let result = prepare(&mut session, &fast_motion());
        assert!(matches!(
            result,
            Err(AppError::Device(BackendError::MotionTimeout { target: -30, attempts: 2 }))
        ));
    }
}
