// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the sweep state machine

use linear_scanner::constants::{TILT_MAX_DEGREES, TILT_MIN_DEGREES};
use linear_scanner::sweep::next;
use linear_scanner::{Direction, SweepController, SweepState};

fn run_to_threshold(threshold: u32) -> Vec<SweepState> {
    let mut controller = SweepController::new(threshold);
    let mut states = Vec::new();
    while let Some((state, target)) = controller.step() {
        assert_eq!(state.angle, target, "Commanded angle must match the new state");
        states.push(state);
    }
    states
}

#[test]
fn test_single_half_cycle() {
    // Polled mode: -30 up to +30 and one step back
    let states = run_to_threshold(1);
    assert_eq!(states.len(), 61);

    assert_eq!(
        states[0],
        SweepState {
            angle: -29,
            direction: Direction::Up,
            half_cycles: 0,
        }
    );
    assert_eq!(
        states[59],
        SweepState {
            angle: 30,
            direction: Direction::Up,
            half_cycles: 0,
        }
    );
    assert_eq!(
        states[60],
        SweepState {
            angle: 29,
            direction: Direction::Down,
            half_cycles: 1,
        }
    );
}

#[test]
fn test_three_half_cycles() {
    // Streamed mode: 61 steps for the first half-cycle, 60 for each after it
    let states = run_to_threshold(3);
    assert_eq!(states.len(), 181);
    assert_eq!(
        states.last().copied(),
        Some(SweepState {
            angle: 29,
            direction: Direction::Down,
            half_cycles: 3,
        })
    );
}

#[test]
fn test_angle_stays_in_range() {
    for state in run_to_threshold(5) {
        assert!(
            (TILT_MIN_DEGREES..=TILT_MAX_DEGREES).contains(&state.angle),
            "Angle {} out of range",
            state.angle
        );
    }
}

#[test]
fn test_every_step_moves_one_degree() {
    let mut previous = SweepState::initial();
    for state in run_to_threshold(4) {
        let delta = (i16::from(state.angle) - i16::from(previous.angle)).abs();
        assert_eq!(delta, 1);
        previous = state;
    }
}

#[test]
fn test_direction_flips_only_at_extremes() {
    let mut previous = SweepState::initial();
    for state in run_to_threshold(4) {
        if state.direction != previous.direction {
            // Flip happens when leaving an extreme, and counts one half-cycle
            assert!(
                previous.angle == TILT_MAX_DEGREES || previous.angle == TILT_MIN_DEGREES,
                "Flipped at {}",
                previous.angle
            );
            assert_eq!(state.half_cycles, previous.half_cycles + 1);
        } else {
            assert_eq!(state.half_cycles, previous.half_cycles);
        }
        previous = state;
    }
}

#[test]
fn test_free_function_matches_method() {
    let state = SweepState {
        angle: 12,
        direction: Direction::Down,
        half_cycles: 1,
    };
    assert_eq!(next(state), state.next());
}

#[test]
fn test_resume_from_state() {
    // A controller resumed just below the top flips on its second step
    let start = SweepState {
        angle: 29,
        direction: Direction::Up,
        half_cycles: 0,
    };
    let mut controller = SweepController::with_state(start, 1);
    assert_eq!(controller.step().map(|(_, target)| target), Some(30));
    assert_eq!(controller.step().map(|(_, target)| target), Some(29));
    assert!(controller.step().is_none());
    assert_eq!(controller.steps(), 2);
}
