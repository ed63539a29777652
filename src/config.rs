//! Configuration: one optional JSON document plus a few environment knobs.
//!
//! Every key is optional and defaults match the values documented on the
//! fields. The document is looked up at `ELECTRIC_CHAIR_CONFIG`, falling
//! back to `config.json` in the working directory, falling back to pure
//! defaults. Environment knobs (`ELECTRIC_CHAIR_BASE_PATH`,
//! `ELECTRIC_CHAIR_PORT`, `RAYON_NUM_THREADS`) are shared by all binaries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_OUTPUT_DIR;
use crate::error::SolverError;

/// Analyzer settings (`analysis.*` in the document).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisSettings {
    /// Per-batch ceiling on states solved between store flushes. Default 1000.
    pub max_batch_size: usize,
    /// Decimal digits kept when rounding stored probabilities and values. Default 6.
    pub precision_digits: u32,
    /// Checkpoint interval (states) within a batch. Default 100.
    pub save_interval: usize,
    /// Root directory of the strategy stores and progress record.
    pub output_directory: PathBuf,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            max_batch_size: 1000,
            precision_digits: 6,
            save_interval: 100,
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Terminal evaluation settings (`evaluation.*` in the document).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluationSettings {
    /// Player-1-perspective payoff assigned to a draw. Default 0.0.
    pub draw: f64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        EvaluationSettings { draw: 0.0 }
    }
}

/// Resolved configuration for one solver run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub analysis: AnalysisSettings,
    pub evaluation: EvaluationSettings,
}

impl Config {
    /// Parse a configuration document.
    pub fn from_file(path: &Path) -> Result<Config, SolverError> {
        let text = std::fs::read_to_string(path).map_err(|e| SolverError::storage(path, e))?;
        serde_json::from_str(&text).map_err(|e| SolverError::format(path, e))
    }

    /// Resolve configuration from the environment: `ELECTRIC_CHAIR_CONFIG`
    /// if set, else `config.json` if present, else defaults.
    pub fn load() -> Result<Config, SolverError> {
        if let Ok(path) = std::env::var("ELECTRIC_CHAIR_CONFIG") {
            return Config::from_file(Path::new(&path));
        }
        let default_path = Path::new("config.json");
        if default_path.exists() {
            return Config::from_file(default_path);
        }
        Ok(Config::default())
    }
}

/// Read `ELECTRIC_CHAIR_BASE_PATH` (default `"."`), chdir, print the path.
/// Exits on failure.
pub fn init_base_path() -> PathBuf {
    let base_path = std::env::var("ELECTRIC_CHAIR_BASE_PATH").unwrap_or_else(|_| ".".to_string());
    println!("ELECTRIC_CHAIR_BASE_PATH={}", base_path);
    let path = PathBuf::from(&base_path);
    if std::env::set_current_dir(&base_path).is_err() {
        eprintln!("Failed to change directory to {}", base_path);
        std::process::exit(1);
    }
    if let Ok(cwd) = std::env::current_dir() {
        println!("Working directory: {}", cwd.display());
    }
    path
}

/// Read `RAYON_NUM_THREADS` (fallback `OMP_NUM_THREADS`, default 8) and
/// build the global rayon pool, tolerating an already-initialized pool.
/// Returns the thread count.
pub fn init_rayon_threads() -> usize {
    let num_threads = std::env::var("RAYON_NUM_THREADS")
        .or_else(|_| std::env::var("OMP_NUM_THREADS"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .ok(); // May fail if already initialized
    println!("Rayon threads: {}", num_threads);
    num_threads
}

/// Read `ELECTRIC_CHAIR_PORT` (default 9000).
pub fn server_port() -> u16 {
    std::env::var("ELECTRIC_CHAIR_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.analysis.max_batch_size, 1000);
        assert_eq!(cfg.analysis.precision_digits, 6);
        assert_eq!(cfg.analysis.save_interval, 100);
        assert_eq!(
            cfg.analysis.output_directory,
            PathBuf::from("./analysis-results")
        );
        assert_eq!(cfg.evaluation.draw, 0.0);
    }

    #[test]
    fn test_partial_document() {
        let cfg: Config = serde_json::from_str(
            r#"{ "analysis": { "maxBatchSize": 250 }, "evaluation": { "draw": -0.25 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.max_batch_size, 250);
        assert_eq!(cfg.analysis.save_interval, 100);
        assert_eq!(cfg.evaluation.draw, -0.25);
    }

    #[test]
    fn test_empty_document() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.analysis.max_batch_size, 1000);
    }
}
