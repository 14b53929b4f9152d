// SPDX-License-Identifier: GPL-3.0-only

//! Tilt sweep state machine
//!
//! The sweep walks the motor one degree per iteration between
//! [`TILT_MIN_DEGREES`] and [`TILT_MAX_DEGREES`]. When a step would leave the
//! range the direction flips and the angle moves one degree back inward in
//! the same iteration, so each extreme is visited once per half-cycle.
//!
//! ```text
//!   -30 ──► -29 ──► ... ──► +30 ─┐
//!                                 │ flip (half_cycles += 1)
//!   -30 ◄── ... ◄── +28 ◄── +29 ◄─┘
//! ```

use std::fmt;

use serde::Deserialize;

use crate::constants::{INITIAL_TILT_DEGREES, TILT_MAX_DEGREES, TILT_MIN_DEGREES};

/// Direction the tilt angle is currently moving in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum Direction {
    /// Angle increases each step
    #[default]
    Up,
    /// Angle decreases each step
    Down,
}

impl Direction {
    /// Numeric code written to the log (0 = up, 1 = down)
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
        }
    }

    /// Parse a log code back into a direction
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::Up),
            1 => Some(Direction::Down),
            _ => None,
        }
    }

    /// Label used in progress output
    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Direction::from_code(code).ok_or_else(|| format!("invalid direction code {}", code))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Complete state of the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepState {
    /// Current tilt target in degrees, always within the sweep range
    pub angle: i8,
    /// Direction of the next regular step
    pub direction: Direction,
    /// Number of direction flips so far
    pub half_cycles: u32,
}

impl SweepState {
    /// State at startup: parked at the lower bound, heading up
    pub const fn initial() -> Self {
        Self {
            angle: INITIAL_TILT_DEGREES,
            direction: Direction::Up,
            half_cycles: 0,
        }
    }

    /// Compute the following state and the angle to command
    pub fn next(self) -> (SweepState, i8) {
        let mut state = self;
        match self.direction {
            Direction::Up if self.angle >= TILT_MAX_DEGREES => {
                state.direction = Direction::Down;
                state.angle = self.angle - 1;
                state.half_cycles += 1;
            }
            Direction::Up => state.angle = self.angle + 1,
            Direction::Down if self.angle <= TILT_MIN_DEGREES => {
                state.direction = Direction::Up;
                state.angle = self.angle + 1;
                state.half_cycles += 1;
            }
            Direction::Down => state.angle = self.angle - 1,
        }
        (state, state.angle)
    }

    /// The part of the state the sample logger records
    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            angle: self.angle,
            direction: self.direction,
        }
    }
}

impl Default for SweepState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Pure transition function, see [`SweepState::next`]
pub fn next(state: SweepState) -> (SweepState, i8) {
    state.next()
}

/// Angle and direction as seen by the sample logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSnapshot {
    pub angle: i8,
    pub direction: Direction,
}

/// Drives [`SweepState`] until a number of half-cycles is complete
#[derive(Debug, Clone)]
pub struct SweepController {
    state: SweepState,
    threshold: u32,
    steps: u32,
}

impl SweepController {
    /// Create a controller that stops after `threshold` half-cycles
    pub fn new(threshold: u32) -> Self {
        Self::with_state(SweepState::initial(), threshold)
    }

    /// Create a controller resuming from an arbitrary state
    pub fn with_state(state: SweepState, threshold: u32) -> Self {
        Self {
            state,
            threshold,
            steps: 0,
        }
    }

    /// Advance one iteration
    ///
    /// Returns the new state and the angle to command, or `None` once the
    /// configured number of half-cycles has been completed.
    pub fn step(&mut self) -> Option<(SweepState, i8)> {
        if self.is_finished() {
            return None;
        }
        let (state, target) = self.state.next();
        self.state = state;
        self.steps += 1;
        Some((state, target))
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Iterations taken so far
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.state.half_cycles >= self.threshold
    }
}
