//! # Electric Chair - exhaustive equilibrium solver
//!
//! Solves the two-player zero-sum simultaneous-move chair game exactly:
//! every reachable position gets a mixed-strategy Nash equilibrium and a
//! game value, computed by **retrograde analysis** over the full state
//! space (~6M positions).
//!
//! ## Pipeline
//!
//! | Phase | Binary | Rust module | Description |
//! |-------|--------|-------------|-------------|
//! | 1 | `electric-chair-enumerate` | [`reachability`] | Breadth-first expansion by turn; per-turn sorted state sets persisted as JSON chunks |
//! | 2 | `electric-chair-analyze` | [`analysis`] | Backward induction, deepest turn first; each state's matrix game solved by LP against stored successor values |
//! | - | `electric-chair-server` | [`server`] | Read-only HTTP lookups for gameplay consumers |
//!
//! ## State representation
//!
//! A position packs into 32 bits ([`state`]): 4-bit turn, 12-bit chair
//! mask, two 6-bit scores, two 2-bit shock counters. Status (win / loss /
//! draw / in progress) is a pure function of those fields, so the packed
//! word is the canonical identity of a position everywhere: in the
//! reachability sets, in the strategy store keys, and over the query API.
//!
//! ## Solving order
//!
//! Turns form the dependency chain: every successor of an in-progress
//! state lives at a strictly later turn (terminal successors keep their
//! turn but never need solving beyond their fixed payoff). The driver
//! walks turns from the deepest down to 0, preloading the next turn's
//! values as the payoff oracle, so the write-before-reference guarantee
//! holds by construction.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod error;
pub mod matrix_game;
pub mod query;
pub mod reachability;
pub mod rules;
pub mod server;
pub mod state;
pub mod store;
