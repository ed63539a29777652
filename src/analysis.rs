//! Analysis driver: backward induction over the reachable state space.
//!
//! Turns are processed in strictly decreasing order, so every value a
//! payoff matrix references has been stored before the referencing state
//! is solved. Within a turn the states are independent: batches are
//! solved on the rayon pool against a read-only successor map, then
//! written sequentially, so worker ordering never shows in the output.
//!
//! `progress.json` carries per-turn totals and solved counts; a run can
//! be interrupted between batches (or killed outright) and resumed, since
//! the per-turn store index records exactly which states are done.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::constants::*;
use crate::error::SolverError;
use crate::matrix_game::{solve_state, terminal_strategy, Strategy};
use crate::reachability::{load_turn_states, read_turn_meta};
use crate::state::{status_of, Status};
use crate::store::TurnStore;

/// `progress.json` contents. Keys of both maps are decimal turn numbers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub analyzed_states: BTreeMap<String, usize>,
    pub total_states: BTreeMap<String, usize>,
    pub last_updated: String,
    pub is_complete: bool,
}

impl ProgressRecord {
    fn empty() -> ProgressRecord {
        ProgressRecord {
            analyzed_states: BTreeMap::new(),
            total_states: BTreeMap::new(),
            last_updated: Utc::now().to_rfc3339(),
            is_complete: false,
        }
    }

    /// A turn's solved count.
    pub fn analyzed(&self, turn: u8) -> usize {
        self.analyzed_states
            .get(&turn.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// A turn's reachable-state total.
    pub fn total(&self, turn: u8) -> usize {
        self.total_states
            .get(&turn.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Turns with a recorded total, descending.
    pub fn turns_descending(&self) -> Vec<u8> {
        let mut turns: Vec<u8> = self
            .total_states
            .keys()
            .filter_map(|k| k.parse().ok())
            .collect();
        turns.sort_unstable_by(|a, b| b.cmp(a));
        turns
    }

    fn recompute_complete(&mut self) {
        self.is_complete = self
            .turns_descending()
            .into_iter()
            .filter(|&t| self.total(t) > 0)
            .all(|t| self.analyzed(t) >= self.total(t));
    }
}

/// Print the progress summary as a per-turn table.
pub fn print_summary(progress: &ProgressRecord) {
    println!("Turn | Total    | Analyzed | ");
    println!("-----|----------|----------|-");
    let mut turns = progress.turns_descending();
    turns.reverse();
    let (mut total, mut analyzed) = (0usize, 0usize);
    for turn in turns {
        println!(
            "  {:2} | {:8} | {:8} | {}",
            turn,
            progress.total(turn),
            progress.analyzed(turn),
            if progress.analyzed(turn) >= progress.total(turn) {
                "done"
            } else {
                ""
            }
        );
        total += progress.total(turn);
        analyzed += progress.analyzed(turn);
    }
    let pct = if total > 0 {
        analyzed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    println!(
        "Overall: {}/{} states ({:.2}%), complete: {}",
        analyzed, total, pct, progress.is_complete
    );
    println!("Last updated: {}", progress.last_updated);
}

/// Drives the equilibrium solver over every reachable state.
pub struct Analyzer {
    config: Config,
    hashes_dir: PathBuf,
    stop: Arc<AtomicBool>,
}

impl Analyzer {
    /// Analyzer over the default reachability directory.
    pub fn new(config: Config) -> Analyzer {
        Analyzer::with_hashes_dir(config, STATE_HASHES_DIR)
    }

    /// Analyzer with an explicit reachability directory.
    pub fn with_hashes_dir(config: Config, hashes_dir: impl Into<PathBuf>) -> Analyzer {
        Analyzer {
            config,
            hashes_dir: hashes_dir.into(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag that requests a clean stop at the next batch boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn out_dir(&self) -> &Path {
        &self.config.analysis.output_directory
    }

    fn progress_path(&self) -> PathBuf {
        self.out_dir().join("progress.json")
    }

    fn turn_store_dir(&self, turn: u8) -> PathBuf {
        self.out_dir().join(format!("turn-{}", turn))
    }

    fn save_progress(&self, progress: &mut ProgressRecord) -> Result<(), SolverError> {
        progress.recompute_complete();
        progress.last_updated = Utc::now().to_rfc3339();
        std::fs::create_dir_all(self.out_dir())
            .map_err(|e| SolverError::storage(self.out_dir(), e))?;
        let path = self.progress_path();
        let text =
            serde_json::to_string_pretty(progress).expect("progress serialization cannot fail");
        std::fs::write(&path, text).map_err(|e| SolverError::storage(&path, e))
    }

    /// Read `progress.json`, `None` if no record exists yet.
    pub fn load_progress(&self) -> Result<Option<ProgressRecord>, SolverError> {
        let path = self.progress_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| SolverError::storage(&path, e))?;
        let progress = serde_json::from_str(&text).map_err(|e| SolverError::format(&path, e))?;
        Ok(Some(progress))
    }

    /// Build a fresh progress record from the reachability metadata and
    /// whatever the stores already hold, and persist it.
    pub fn initialize(&self) -> Result<ProgressRecord, SolverError> {
        let mut progress = ProgressRecord::empty();
        for turn in 0..MAX_TURNS {
            if let Some(meta) = read_turn_meta(&self.hashes_dir, turn)? {
                progress
                    .total_states
                    .insert(turn.to_string(), meta.total_count);
                let store = TurnStore::open(
                    self.turn_store_dir(turn),
                    DEFAULT_STRATEGY_CHUNK_SIZE,
                )?;
                progress
                    .analyzed_states
                    .insert(turn.to_string(), store.len());
            }
        }
        if progress.total_states.is_empty() {
            eprintln!(
                "Warning: no reachability metadata under {} (run the enumerator first)",
                self.hashes_dir.display()
            );
        }
        self.save_progress(&mut progress)?;
        Ok(progress)
    }

    /// Delete every strategy store and reset the progress record.
    pub fn clear(&self) -> Result<(), SolverError> {
        if self.out_dir().exists() {
            let entries = std::fs::read_dir(self.out_dir())
                .map_err(|e| SolverError::storage(self.out_dir(), e))?;
            for entry in entries {
                let entry = entry.map_err(|e| SolverError::storage(self.out_dir(), e))?;
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with("turn-") && entry.path().is_dir() {
                    std::fs::remove_dir_all(entry.path())
                        .map_err(|e| SolverError::storage(entry.path(), e))?;
                } else if name == "progress.json" {
                    std::fs::remove_file(entry.path())
                        .map_err(|e| SolverError::storage(entry.path(), e))?;
                }
            }
        }
        self.initialize()?;
        Ok(())
    }

    /// Solve up to `max_states` not-yet-solved states, deepest turn first.
    ///
    /// Returns the number of states actually processed. Stops early at a
    /// batch boundary when the stop flag is raised; the batch in flight is
    /// flushed and the progress record updated either way.
    pub fn run(&self, max_states: usize) -> Result<usize, SolverError> {
        let start = Instant::now();
        let mut progress = match self.load_progress()? {
            Some(p) => p,
            None => self.initialize()?,
        };

        let draw = self.config.evaluation.draw;
        let precision = self.config.analysis.precision_digits;
        let batch_size = self.config.analysis.max_batch_size.max(1);
        let save_interval = self.config.analysis.save_interval.max(1);
        let mut processed = 0usize;

        'turns: for turn in progress.turns_descending() {
            let total = progress.total(turn);
            if total == 0 || progress.analyzed(turn) >= total {
                continue;
            }

            let states = load_turn_states(&self.hashes_dir, turn)?;
            let mut store =
                TurnStore::open(self.turn_store_dir(turn), DEFAULT_STRATEGY_CHUNK_SIZE)?;
            let pending: Vec<u32> = states
                .iter()
                .copied()
                .filter(|&code| !store.contains(code))
                .collect();
            println!(
                "Turn {:2}: {} of {} states pending",
                turn,
                pending.len(),
                total
            );

            // Reconcile a stale count, e.g. after a crash between a store
            // flush and the progress checkpoint.
            if progress.analyzed(turn) != store.len() {
                progress
                    .analyzed_states
                    .insert(turn.to_string(), store.len());
                self.save_progress(&mut progress)?;
            }
            if pending.is_empty() {
                continue;
            }

            // Successor oracle: every stored value one turn deeper. Same
            // turn terminals never consult it, so turn 15 reads an empty
            // store.
            let successor_values =
                TurnStore::open(self.turn_store_dir(turn + 1), DEFAULT_STRATEGY_CHUNK_SIZE)?
                    .load_values()?;

            for batch in pending.chunks(batch_size) {
                if processed >= max_states {
                    break 'turns;
                }
                let take = batch.len().min(max_states - processed);
                let batch = &batch[..take];

                let solved: Result<Vec<(u32, Strategy)>, SolverError> = batch
                    .par_iter()
                    .map(|&code| {
                        let strategy = match status_of(code) {
                            Status::InProgress => {
                                solve_state(code, &successor_values, draw, precision)?
                            }
                            terminal => terminal_strategy(terminal, draw, precision),
                        };
                        Ok((code, strategy))
                    })
                    .collect();
                let solved = solved?;

                for (i, (code, strategy)) in solved.into_iter().enumerate() {
                    store.put(code, strategy)?;
                    processed += 1;
                    if (i + 1) % save_interval == 0 {
                        store.flush()?;
                        progress
                            .analyzed_states
                            .insert(turn.to_string(), store.len());
                        self.save_progress(&mut progress)?;
                    }
                }
                store.flush()?;
                progress
                    .analyzed_states
                    .insert(turn.to_string(), store.len());
                self.save_progress(&mut progress)?;

                if self.stop.load(Ordering::Relaxed) {
                    println!("Stop requested; flushed after {} states", processed);
                    return Ok(processed);
                }
            }

            if progress.analyzed(turn) >= total {
                println!("Turn {:2} complete ({} states)", turn, total);
            }
        }

        // Every batch already checkpointed itself; a run that solved
        // nothing must leave the output files untouched.
        progress.recompute_complete();
        println!(
            "Processed {} states in {:.2}s (complete: {})",
            processed,
            start.elapsed().as_secs_f64(),
            progress.is_complete
        );
        Ok(processed)
    }
}
