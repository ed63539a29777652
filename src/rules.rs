//! Rule engine: the pure transition function for one simultaneous turn.
//!
//! Each turn, the chair-selector picks a chair to sit on and the
//! electric-setter secretly wires one. A match electrocutes the selector:
//! their score resets and their shock counter increments. A miss banks the
//! chair's face value for the selector and removes the chair from play.
//! Roles alternate by turn parity and are computed, never stored.

use crate::constants::*;
use crate::error::SolverError;
use crate::state::{chairs_of, status_of, GameState, Status};

/// Player A selects on even turns and sets the electric chair on odd turns.
#[inline(always)]
pub fn selector_is_a(turn: u8) -> bool {
    turn % 2 == 0
}

/// Diagnostic bundle for one applied turn. Only `next` is needed by the
/// solver; the rest exists for observers replaying a line of play.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnOutcome {
    /// Encoding of the resulting position.
    pub next: u32,
    /// Whether the setter guessed the selector's chair.
    pub matched: bool,
    /// Face value banked by the selector (0 on a match).
    pub points: u8,
    /// Whether the selector took a shock.
    pub shocked: bool,
    /// Chair removed from the board, if any.
    pub removed: Option<u8>,
}

#[inline(always)]
fn chair_present(mask: u16, chair: u8) -> bool {
    (1..=NUM_CHAIRS as u8).contains(&chair) && mask & (1 << (chair - 1)) != 0
}

/// Apply one turn to an in-progress position.
///
/// Both choices must name chairs currently on the board. The status of the
/// updated fields is evaluated with the pre-step turn index; only a
/// position that is still in progress advances its turn counter, so a
/// terminal state keeps the turn it terminated on.
pub fn step(code: u32, selector_choice: u8, setter_choice: u8) -> Result<TurnOutcome, SolverError> {
    if status_of(code) != Status::InProgress {
        return Err(SolverError::TerminalStep { state: code });
    }
    let chairs = chairs_of(code);
    if !chair_present(chairs, selector_choice) {
        return Err(SolverError::InvalidChoice {
            state: code,
            choice: selector_choice,
        });
    }
    if !chair_present(chairs, setter_choice) {
        return Err(SolverError::InvalidChoice {
            state: code,
            choice: setter_choice,
        });
    }

    let mut state = GameState::decode(code);
    let matched = selector_choice == setter_choice;
    let selector_a = selector_is_a(state.turn);

    let (points, removed) = if matched {
        if selector_a {
            state.score_a = 0;
            state.shock_a += 1;
        } else {
            state.score_b = 0;
            state.shock_b += 1;
        }
        (0, None)
    } else {
        // Any total past the win threshold ends the game, so the stored
        // score saturates at the sentinel.
        let gain = selector_choice;
        if selector_a {
            state.score_a = (state.score_a + gain).min(WIN_SCORE);
        } else {
            state.score_b = (state.score_b + gain).min(WIN_SCORE);
        }
        state.chairs &= !(1 << (selector_choice - 1));
        (gain, Some(selector_choice))
    };

    let mut next = state.encode();
    if status_of(next) == Status::InProgress {
        state.turn += 1;
        next = state.encode();
    }

    Ok(TurnOutcome {
        next,
        matched,
        points,
        shocked: matched,
        removed,
    })
}
