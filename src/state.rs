//! State codec: bijective packing of a game position into a `u32`.
//!
//! The packed form is the canonical identity of a position. Distinct
//! trajectories that reach the same position collide into one encoding,
//! which is what makes set deduplication and chunked persistence work.
//! Terminal status is never stored; it is derived from the fields alone,
//! so two encodings with equal fields always agree on status.

use crate::constants::*;
use crate::error::SolverError;

/// A decoded game position.
///
/// `chairs` is a 12-bit mask: bit `i` set means chair `i + 1` is still on
/// the board. Scores cap at [`WIN_SCORE`]; shock counters cap at
/// [`SHOCK_LIMIT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameState {
    pub turn: u8,
    pub chairs: u16,
    pub score_a: u8,
    pub score_b: u8,
    pub shock_a: u8,
    pub shock_b: u8,
}

/// Derived game status, Player-1 (A) perspective for the win variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    InProgress,
    AWins,
    BWins,
    Draw,
}

impl GameState {
    /// The unique starting position.
    pub const INITIAL: GameState = GameState {
        turn: 0,
        chairs: ALL_CHAIRS,
        score_a: 0,
        score_b: 0,
        shock_a: 0,
        shock_b: 0,
    };

    /// Pack into the 32-bit layout, rejecting out-of-range fields.
    ///
    /// Scores above [`WIN_SCORE`] fit the 6-bit field but are unreachable
    /// under the rules, so they are rejected to catch upstream bugs.
    pub fn try_encode(&self) -> Result<u32, SolverError> {
        if self.turn as u32 > TURN_FIELD_MASK {
            return Err(SolverError::EncodingOverflow {
                field: "turn",
                value: self.turn as u32,
            });
        }
        if self.chairs as u32 > CHAIRS_FIELD_MASK {
            return Err(SolverError::EncodingOverflow {
                field: "chairs",
                value: self.chairs as u32,
            });
        }
        if self.score_a > WIN_SCORE {
            return Err(SolverError::EncodingOverflow {
                field: "score_a",
                value: self.score_a as u32,
            });
        }
        if self.score_b > WIN_SCORE {
            return Err(SolverError::EncodingOverflow {
                field: "score_b",
                value: self.score_b as u32,
            });
        }
        if self.shock_a > SHOCK_LIMIT {
            return Err(SolverError::EncodingOverflow {
                field: "shock_a",
                value: self.shock_a as u32,
            });
        }
        if self.shock_b > SHOCK_LIMIT {
            return Err(SolverError::EncodingOverflow {
                field: "shock_b",
                value: self.shock_b as u32,
            });
        }
        Ok((self.turn as u32) << TURN_SHIFT
            | (self.chairs as u32) << CHAIRS_SHIFT
            | (self.score_a as u32) << SCORE_A_SHIFT
            | (self.score_b as u32) << SCORE_B_SHIFT
            | (self.shock_a as u32) << SHOCK_A_SHIFT
            | (self.shock_b as u32) << SHOCK_B_SHIFT)
    }

    /// Pack into the 32-bit layout. Panics on out-of-range fields.
    pub fn encode(&self) -> u32 {
        match self.try_encode() {
            Ok(code) => code,
            Err(e) => panic!("unencodable state {:?}: {}", self, e),
        }
    }

    /// Inverse of [`GameState::encode`]. Panics on a score field above
    /// [`WIN_SCORE`], which no legal transition can produce.
    pub fn decode(code: u32) -> GameState {
        let state = GameState {
            turn: ((code >> TURN_SHIFT) & TURN_FIELD_MASK) as u8,
            chairs: ((code >> CHAIRS_SHIFT) & CHAIRS_FIELD_MASK) as u16,
            score_a: ((code >> SCORE_A_SHIFT) & SCORE_FIELD_MASK) as u8,
            score_b: ((code >> SCORE_B_SHIFT) & SCORE_FIELD_MASK) as u8,
            shock_a: ((code >> SHOCK_A_SHIFT) & SHOCK_FIELD_MASK) as u8,
            shock_b: ((code >> SHOCK_B_SHIFT) & SHOCK_FIELD_MASK) as u8,
        };
        assert!(
            state.score_a <= WIN_SCORE && state.score_b <= WIN_SCORE,
            "corrupt encoding {:#010x}: score out of range ({}, {})",
            code,
            state.score_a,
            state.score_b
        );
        state
    }

    /// Derived status of this position.
    pub fn status(&self) -> Status {
        status_of(self.encode())
    }
}

/// Turn field of an encoding.
#[inline(always)]
pub fn turn_of(code: u32) -> u8 {
    ((code >> TURN_SHIFT) & TURN_FIELD_MASK) as u8
}

/// Chair mask of an encoding.
#[inline(always)]
pub fn chairs_of(code: u32) -> u16 {
    ((code >> CHAIRS_SHIFT) & CHAIRS_FIELD_MASK) as u16
}

/// Derive the status of an encoded position without decoding it.
///
/// Priority order matters: shock losses outrank score wins, and both
/// outrank the endgame score comparison.
#[inline(always)]
pub fn status_of(code: u32) -> Status {
    let shock_a = ((code >> SHOCK_A_SHIFT) & SHOCK_FIELD_MASK) as u8;
    let shock_b = ((code >> SHOCK_B_SHIFT) & SHOCK_FIELD_MASK) as u8;
    if shock_a == SHOCK_LIMIT {
        return Status::BWins;
    }
    if shock_b == SHOCK_LIMIT {
        return Status::AWins;
    }

    let score_a = ((code >> SCORE_A_SHIFT) & SCORE_FIELD_MASK) as u8;
    let score_b = ((code >> SCORE_B_SHIFT) & SCORE_FIELD_MASK) as u8;
    if score_a == WIN_SCORE {
        return Status::AWins;
    }
    if score_b == WIN_SCORE {
        return Status::BWins;
    }

    let remaining = chairs_of(code).count_ones();
    if remaining == 1 || turn_of(code) >= FINAL_TURN {
        return match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => Status::AWins,
            std::cmp::Ordering::Less => Status::BWins,
            std::cmp::Ordering::Equal => Status::Draw,
        };
    }

    Status::InProgress
}

/// Whether an encoded position is terminal.
#[inline(always)]
pub fn is_terminal(code: u32) -> bool {
    status_of(code) != Status::InProgress
}

/// Chairs present in a mask, ascending (chair numbers 1-12).
pub fn present_chairs(mask: u16) -> Vec<u8> {
    (1..=NUM_CHAIRS as u8)
        .filter(|&c| mask & (1 << (c - 1)) != 0)
        .collect()
}

/// Lowercase hex rendering used for all on-disk keys: no `0x`, no leading
/// zeros, matching the unsigned 32-bit value.
#[inline(always)]
pub fn to_hex(code: u32) -> String {
    format!("{:x}", code)
}

/// Parse a key produced by [`to_hex`].
pub fn from_hex(s: &str) -> Option<u32> {
    u32::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_encoding() {
        assert_eq!(GameState::INITIAL.encode(), 0x0FFF_0000);
        assert_eq!(GameState::INITIAL.encode(), INITIAL_STATE);
        assert_eq!(status_of(INITIAL_STATE), Status::InProgress);
    }

    #[test]
    fn test_round_trip() {
        let state = GameState {
            turn: 7,
            chairs: 0b1010_0110_0001,
            score_a: 23,
            score_b: 31,
            shock_a: 1,
            shock_b: 2,
        };
        assert_eq!(GameState::decode(state.encode()), state);
    }

    #[test]
    fn test_turn_in_top_bits() {
        for turn in 0..16u8 {
            let state = GameState {
                turn,
                ..GameState::INITIAL
            };
            assert_eq!(state.encode() >> 28, turn as u32);
        }
    }

    #[test]
    fn test_status_priority() {
        // Shock loss outranks a score win.
        let s = GameState {
            turn: 4,
            chairs: 0b111,
            score_a: 40,
            score_b: 0,
            shock_a: 3,
            shock_b: 0,
        };
        assert_eq!(s.status(), Status::BWins);

        let s = GameState {
            turn: 4,
            chairs: 0b111,
            score_a: 12,
            score_b: 40,
            shock_a: 0,
            shock_b: 3,
        };
        assert_eq!(s.status(), Status::AWins);
    }

    #[test]
    fn test_score_win() {
        let s = GameState {
            turn: 6,
            chairs: 0b11110,
            score_a: 40,
            score_b: 17,
            shock_a: 1,
            shock_b: 0,
        };
        assert_eq!(s.status(), Status::AWins);
    }

    #[test]
    fn test_last_chair_comparison() {
        let mut s = GameState {
            turn: 9,
            chairs: 1 << 6, // only chair 7
            score_a: 20,
            score_b: 20,
            shock_a: 0,
            shock_b: 0,
        };
        assert_eq!(s.status(), Status::Draw);
        s.score_a = 21;
        assert_eq!(s.status(), Status::AWins);
        s.score_a = 19;
        assert_eq!(s.status(), Status::BWins);
    }

    #[test]
    fn test_turn_limit_terminal() {
        let s = GameState {
            turn: 15,
            chairs: 0b11_1100,
            score_a: 18,
            score_b: 25,
            shock_a: 1,
            shock_b: 1,
        };
        assert_eq!(s.status(), Status::BWins);
    }

    #[test]
    fn test_try_encode_rejects_overscore() {
        let s = GameState {
            score_a: 41,
            ..GameState::INITIAL
        };
        assert!(matches!(
            s.try_encode(),
            Err(SolverError::EncodingOverflow { field: "score_a", .. })
        ));
    }

    #[test]
    fn test_present_chairs() {
        assert_eq!(
            present_chairs(ALL_CHAIRS),
            (1..=12).collect::<Vec<u8>>()
        );
        assert_eq!(present_chairs(0b1000_0000_0101), vec![1, 3, 12]);
        assert_eq!(present_chairs(0), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(to_hex(INITIAL_STATE), "fff0000");
        assert_eq!(from_hex("fff0000"), Some(INITIAL_STATE));
        assert_eq!(from_hex("zz"), None);
    }
}
