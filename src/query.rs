//! Read-side interface for consumers of the analysis outputs.
//!
//! A [`StrategyReader`] resolves any encoded state to its stored strategy
//! by routing through the per-turn stores. Lookups are soft: an unsolved
//! state returns `None`, and [`sample_chair`] falls back to a uniform
//! choice over the remaining chairs, which is the behavior game-facing
//! callers rely on when analysis is still in flight.

use std::collections::HashMap;
use std::path::PathBuf;

use rand::Rng;

use crate::constants::DEFAULT_STRATEGY_CHUNK_SIZE;
use crate::error::SolverError;
use crate::matrix_game::Strategy;
use crate::rules::selector_is_a;
use crate::state::{chairs_of, present_chairs, turn_of};
use crate::store::TurnStore;

/// Lazily-opened read handle over every turn's strategy store.
pub struct StrategyReader {
    out_dir: PathBuf,
    stores: HashMap<u8, TurnStore>,
}

impl StrategyReader {
    pub fn new(out_dir: impl Into<PathBuf>) -> StrategyReader {
        StrategyReader {
            out_dir: out_dir.into(),
            stores: HashMap::new(),
        }
    }

    /// Look up the stored strategy for an encoded state, `None` if the
    /// state has not been solved yet.
    pub fn lookup(&mut self, code: u32) -> Result<Option<Strategy>, SolverError> {
        let turn = turn_of(code);
        if !self.stores.contains_key(&turn) {
            let dir = self.out_dir.join(format!("turn-{}", turn));
            let store = TurnStore::open(dir, DEFAULT_STRATEGY_CHUNK_SIZE)?;
            self.stores.insert(turn, store);
        }
        self.stores
            .get_mut(&turn)
            .expect("store just opened")
            .get(code)
    }
}

/// The probability vector a player consults on this turn: the selector
/// reads their own mix, as does the setter; Player A's choices live in
/// `p1Probs` and Player B's in `p2Probs` regardless of role.
pub fn probs_for_player(strategy: &Strategy, player_a: bool) -> &[f64] {
    if player_a {
        &strategy.p1_probs
    } else {
        &strategy.p2_probs
    }
}

/// Whether Player A is the chair-selector for this encoded state's turn.
pub fn selector_is_player_a(code: u32) -> bool {
    selector_is_a(turn_of(code))
}

/// Draw a chair (1-12) for one player.
///
/// With a stored strategy, samples that player's probability vector; with
/// none, falls back to uniform over the chairs still present. Returns
/// `None` only for a chairless mask, which no reachable state has.
pub fn sample_chair<R: Rng>(
    code: u32,
    strategy: Option<&Strategy>,
    player_a: bool,
    rng: &mut R,
) -> Option<u8> {
    let available = present_chairs(chairs_of(code));
    if available.is_empty() {
        return None;
    }

    if let Some(strategy) = strategy {
        let probs = probs_for_player(strategy, player_a);
        let total: f64 = available.iter().map(|&c| probs[c as usize - 1]).sum();
        if total > 0.0 {
            let mut roll = rng.gen::<f64>() * total;
            for &chair in &available {
                roll -= probs[chair as usize - 1];
                if roll <= 0.0 {
                    return Some(chair);
                }
            }
            // Rounding left a sliver of mass unassigned; take the last chair.
            return available.last().copied();
        }
    }

    Some(available[rng.gen_range(0..available.len())])
}
