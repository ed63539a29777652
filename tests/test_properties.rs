//! Property-based tests for the codec, the rule engine, and the LP solver.

use proptest::prelude::*;

use electric_chair::matrix_game::{solve_matrix_game, verify_equilibrium};
use electric_chair::rules::{selector_is_a, step};
use electric_chair::state::{
    chairs_of, is_terminal, present_chairs, status_of, turn_of, GameState, Status,
};

/// Strategy: any field-valid game state (reachability not required).
fn state_strategy() -> impl Strategy<Value = GameState> {
    (0..16u8, 1..=0xFFFu16, 0..=40u8, 0..=40u8, 0..=3u8, 0..=3u8).prop_map(
        |(turn, chairs, score_a, score_b, shock_a, shock_b)| GameState {
            turn,
            chairs,
            score_a,
            score_b,
            shock_a,
            shock_b,
        },
    )
}

/// Strategy: a small square payoff matrix with entries in [-1, 1].
fn matrix_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1..=4usize)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(-1.0..1.0f64, n), n))
}

proptest! {
    // 1. decode inverts encode
    #[test]
    fn codec_round_trip(state in state_strategy()) {
        let code = state.encode();
        prop_assert_eq!(GameState::decode(code), state);
        prop_assert_eq!(GameState::decode(code).encode(), code);
    }

    // 2. The turn always occupies the top 4 bits
    #[test]
    fn turn_in_top_bits(state in state_strategy()) {
        prop_assert_eq!(state.encode() >> 28, state.turn as u32);
        prop_assert_eq!(turn_of(state.encode()), state.turn);
    }

    // 3. Status is a pure function of the fields
    #[test]
    fn status_purity(state in state_strategy()) {
        let code = state.encode();
        prop_assert_eq!(state.status(), status_of(code));
        prop_assert_eq!(status_of(code), status_of(GameState::decode(code).encode()));
    }

    // 4. Rule conservation: a match shocks without removing, a miss
    //    removes without shocking, never both
    #[test]
    fn rule_conservation(
        state in state_strategy(),
        sel_pick in 0..12usize,
        set_pick in 0..12usize,
    ) {
        let code = state.encode();
        prop_assume!(status_of(code) == Status::InProgress);

        let chairs = present_chairs(state.chairs);
        let selector = chairs[sel_pick % chairs.len()];
        let setter = chairs[set_pick % chairs.len()];

        let out = step(code, selector, setter).unwrap();
        let next = GameState::decode(out.next);
        let removed_count = state.chairs.count_ones() - next.chairs.count_ones();
        let selector_a = selector_is_a(state.turn);
        let (old_score, new_score) = if selector_a {
            (state.score_a, next.score_a)
        } else {
            (state.score_b, next.score_b)
        };
        let (old_shock, new_shock) = if selector_a {
            (state.shock_a, next.shock_a)
        } else {
            (state.shock_b, next.shock_b)
        };

        prop_assert!(removed_count <= 1);
        if out.matched {
            prop_assert_eq!(removed_count, 0);
            prop_assert_eq!(new_score, 0);
            prop_assert_eq!(new_shock, old_shock + 1);
        } else {
            prop_assert_eq!(removed_count, 1);
            prop_assert_eq!(next.chairs & (1 << (selector - 1)), 0);
            prop_assert_eq!(new_score, (old_score + selector).min(40));
            prop_assert_eq!(new_shock, old_shock);
        }

        // The non-selector's score and shocks never move.
        if selector_a {
            prop_assert_eq!(next.score_b, state.score_b);
            prop_assert_eq!(next.shock_b, state.shock_b);
        } else {
            prop_assert_eq!(next.score_a, state.score_a);
            prop_assert_eq!(next.shock_a, state.shock_a);
        }
    }

    // 5. Monotone turn: an in-progress successor advances the turn by one;
    //    a terminal successor keeps its turn unless it terminated on the
    //    turn limit itself
    #[test]
    fn monotone_turn(
        state in state_strategy(),
        sel_pick in 0..12usize,
        set_pick in 0..12usize,
    ) {
        let code = state.encode();
        prop_assume!(status_of(code) == Status::InProgress);

        let chairs = present_chairs(state.chairs);
        let selector = chairs[sel_pick % chairs.len()];
        let setter = chairs[set_pick % chairs.len()];
        let out = step(code, selector, setter).unwrap();
        let next_turn = turn_of(out.next);

        if is_terminal(out.next) {
            prop_assert!(
                next_turn == state.turn || (next_turn == state.turn + 1 && next_turn == 15),
                "terminal successor moved from turn {} to {}", state.turn, next_turn
            );
        } else {
            prop_assert_eq!(next_turn, state.turn + 1);
        }
        prop_assert_eq!(chairs_of(out.next).count_ones() > 0, true);
    }

    // 6. The transition is deterministic
    #[test]
    fn step_deterministic(
        state in state_strategy(),
        sel_pick in 0..12usize,
        set_pick in 0..12usize,
    ) {
        let code = state.encode();
        prop_assume!(status_of(code) == Status::InProgress);
        let chairs = present_chairs(state.chairs);
        let selector = chairs[sel_pick % chairs.len()];
        let setter = chairs[set_pick % chairs.len()];
        prop_assert_eq!(
            step(code, selector, setter).unwrap(),
            step(code, selector, setter).unwrap()
        );
    }

    // 7. LP equilibria satisfy the probability law and best response
    #[test]
    fn lp_equilibrium_properties(matrix in matrix_strategy()) {
        let (row, col, value) = solve_matrix_game(&matrix).unwrap();

        for probs in [&row, &col] {
            prop_assert_eq!(probs.len(), matrix.len());
            let mut total = 0.0;
            for &p in probs.iter() {
                prop_assert!((-1e-9..=1.0 + 1e-9).contains(&p), "probability {}", p);
                total += p;
            }
            prop_assert!((total - 1.0).abs() < 1e-6, "mass {}", total);
        }

        let lo = matrix.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        let hi = matrix.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(value >= lo - 1e-7 && value <= hi + 1e-7);

        verify_equilibrium(0, &matrix, &row, &col, value, 1e-6)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
}
