//! Game constants, the 32-bit state layout, and storage defaults.
//!
//! State encoding, most significant to least significant:
//!
//! | bits  | width | field  |
//! |-------|-------|--------|
//! | 31..28 | 4  | turn (0-15) |
//! | 27..16 | 12 | chair mask, bit k = chair k+1 present |
//! | 15..10 | 6  | Player A score |
//! | 9..4   | 6  | Player B score |
//! | 3..2   | 2  | Player A shocks |
//! | 1..0   | 2  | Player B shocks |

/// Number of chairs on the board, labeled 1 through 12.
pub const NUM_CHAIRS: usize = 12;

/// A score of exactly this value is the win sentinel. Unmatched gains that
/// would pass it are stored as the sentinel itself; the game has already
/// ended, so the overshoot is unobservable.
pub const WIN_SCORE: u8 = 40;

/// Accumulating this many shocks loses the game.
pub const SHOCK_LIMIT: u8 = 3;

/// Half-move limit. The turn field is 4 bits, so turn 15 is the last
/// representable index; a state that reaches it is terminal by comparison
/// of scores and is never expanded further.
pub const MAX_TURNS: u8 = 16;

/// First turn index at which the score-comparison terminal rule applies.
pub const FINAL_TURN: u8 = 15;

// Bit layout of the packed state.
pub const TURN_SHIFT: u32 = 28;
pub const CHAIRS_SHIFT: u32 = 16;
pub const SCORE_A_SHIFT: u32 = 10;
pub const SCORE_B_SHIFT: u32 = 4;
pub const SHOCK_A_SHIFT: u32 = 2;
pub const SHOCK_B_SHIFT: u32 = 0;

pub const TURN_FIELD_MASK: u32 = 0xF;
pub const CHAIRS_FIELD_MASK: u32 = 0xFFF;
pub const SCORE_FIELD_MASK: u32 = 0x3F;
pub const SHOCK_FIELD_MASK: u32 = 0x3;

/// Chair mask with all 12 chairs present.
pub const ALL_CHAIRS: u16 = 0x0FFF;

/// The unique starting position: turn 0, all chairs, no points, no shocks.
pub const INITIAL_STATE: u32 = (ALL_CHAIRS as u32) << CHAIRS_SHIFT;

/// Terminal payoff for an A win, Player-1 perspective.
pub const WIN_VALUE: f64 = 1.0;

/// Terminal payoff for a B win, Player-1 perspective.
pub const LOSS_VALUE: f64 = -1.0;

/// States per reachability chunk file.
pub const DEFAULT_STATE_CHUNK_SIZE: usize = 10_000;

/// Strategies per analysis-result chunk file.
pub const DEFAULT_STRATEGY_CHUNK_SIZE: usize = 1_000;

/// Strategy store on-disk format version, recorded in every `index.json`.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Decoded chunks held in memory per open turn store.
pub const STORE_LRU_CHUNKS: usize = 10;

/// Directory holding the per-turn reachable state sets.
pub const STATE_HASHES_DIR: &str = "state-hashes";

/// Default directory for per-turn strategy stores and `progress.json`.
pub const DEFAULT_OUTPUT_DIR: &str = "./analysis-results";

/// Base tolerance for agreement between the row and column LP objectives.
/// The effective threshold scales with the matrix shift.
pub const VALUE_AGREEMENT_EPS: f64 = 5e-8;

/// Tolerance for the best-response check on a claimed equilibrium.
pub const NASH_EPS: f64 = 5e-8;

/// Probability mass below which a strategy vector is replaced by the
/// uniform distribution instead of being renormalized.
pub const RENORM_EPS: f64 = 1e-8;
