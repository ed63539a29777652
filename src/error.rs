//! Error kinds shared across the codec, rule engine, solver, and storage.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while enumerating or solving.
///
/// Codec and rule-engine variants indicate caller bugs and are reported
/// with the offending inputs; solver variants carry the state in hex so a
/// failing position can be replayed.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("chair {choice} is not available in state {state:#010x}")]
    InvalidChoice { state: u32, choice: u8 },

    #[error("step applied to terminal state {state:#010x}")]
    TerminalStep { state: u32 },

    #[error("{field} = {value} exceeds its encoding range")]
    EncodingOverflow { field: &'static str, value: u32 },

    #[error("successor {successor:x} of state {state:x} has no stored value")]
    SuccessorNotSolved { state: u32, successor: u32 },

    #[error("linear program failed for state {state:x}: {detail}")]
    LpFailure { state: u32, detail: String },

    #[error("equilibrium for state {state:x} violates best response by {excess:e}")]
    NashTolerance { state: u32, excess: f64 },

    #[error("storage error at {}: {}", .path.display(), .source)]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed file {}: {}", .path.display(), .source)]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SolverError {
    /// Attach a path to an io error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SolverError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Attach a path to a JSON decode error.
    pub fn format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        SolverError::Format {
            path: path.into(),
            source,
        }
    }
}
