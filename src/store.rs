//! Chunked, index-addressable strategy store for one turn.
//!
//! Layout under `turn-<t>/`:
//! - `index.json`: version, chunk geometry, and the `hashToChunk` map
//!   assigning each stored encoding to its chunk file.
//! - `chunks/chunk-<nnnn>.json`: the strategies of one chunk, keyed by
//!   lowercase-hex encoding.
//!
//! New states are appended to chunk `total_states / chunk_size`; existing
//! keys are rewritten in place (read, merge, write). A bounded LRU of
//! decoded chunks absorbs repeated lookups; dirty chunks are written on
//! eviction and on [`TurnStore::flush`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::SolverError;
use crate::matrix_game::Strategy;
use crate::state::{from_hex, to_hex};

/// `index.json` contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreIndex {
    pub version: u32,
    pub chunk_size: usize,
    pub total_chunks: usize,
    pub total_states: usize,
    pub hash_to_chunk: BTreeMap<String, u32>,
}

impl StoreIndex {
    fn new(chunk_size: usize) -> Self {
        StoreIndex {
            version: STORE_FORMAT_VERSION,
            chunk_size,
            total_chunks: 0,
            total_states: 0,
            hash_to_chunk: BTreeMap::new(),
        }
    }
}

/// One chunk file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrategyChunk {
    chunk_number: u32,
    count: usize,
    strategies: BTreeMap<String, Strategy>,
}

impl StrategyChunk {
    fn new(chunk_number: u32) -> Self {
        StrategyChunk {
            chunk_number,
            count: 0,
            strategies: BTreeMap::new(),
        }
    }
}

/// Read/write handle on one turn's strategy store.
pub struct TurnStore {
    dir: PathBuf,
    index: StoreIndex,
    index_dirty: bool,
    cache: LruCache<u32, StrategyChunk>,
    dirty: HashSet<u32>,
}

impl TurnStore {
    /// Open (or create) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, chunk_size: usize) -> Result<TurnStore, SolverError> {
        let dir = dir.into();
        let index_path = dir.join("index.json");
        let index = if index_path.exists() {
            let text = std::fs::read_to_string(&index_path)
                .map_err(|e| SolverError::storage(&index_path, e))?;
            serde_json::from_str(&text).map_err(|e| SolverError::format(&index_path, e))?
        } else {
            StoreIndex::new(chunk_size)
        };
        Ok(TurnStore {
            dir,
            index,
            index_dirty: false,
            cache: LruCache::new(NonZeroUsize::new(STORE_LRU_CHUNKS).expect("nonzero LRU size")),
            dirty: HashSet::new(),
        })
    }

    /// Number of strategies stored.
    pub fn len(&self) -> usize {
        self.index.total_states
    }

    /// Whether the store holds no strategies.
    pub fn is_empty(&self) -> bool {
        self.index.total_states == 0
    }

    /// Whether a strategy for this encoding has been stored.
    pub fn contains(&self, code: u32) -> bool {
        self.index.hash_to_chunk.contains_key(&to_hex(code))
    }

    fn chunk_path(&self, chunk: u32) -> PathBuf {
        self.dir.join("chunks").join(format!("chunk-{:04}.json", chunk))
    }

    fn read_chunk(&self, chunk: u32) -> Result<StrategyChunk, SolverError> {
        let path = self.chunk_path(chunk);
        if !path.exists() {
            return Ok(StrategyChunk::new(chunk));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| SolverError::storage(&path, e))?;
        serde_json::from_str(&text).map_err(|e| SolverError::format(&path, e))
    }

    fn write_chunk(dir: &Path, chunk: &StrategyChunk) -> Result<(), SolverError> {
        let chunks_dir = dir.join("chunks");
        std::fs::create_dir_all(&chunks_dir).map_err(|e| SolverError::storage(&chunks_dir, e))?;
        let path = chunks_dir.join(format!("chunk-{:04}.json", chunk.chunk_number));
        let text = serde_json::to_string(chunk).expect("chunk serialization cannot fail");
        std::fs::write(&path, text).map_err(|e| SolverError::storage(&path, e))
    }

    /// Load a chunk into the LRU, writing back whatever it evicts if dirty.
    fn load_chunk(&mut self, chunk: u32) -> Result<(), SolverError> {
        if self.cache.contains(&chunk) {
            return Ok(());
        }
        let loaded = self.read_chunk(chunk)?;
        if let Some((evicted_key, evicted)) = self.cache.push(chunk, loaded) {
            if evicted_key != chunk && self.dirty.remove(&evicted_key) {
                Self::write_chunk(&self.dir, &evicted)?;
            }
        }
        Ok(())
    }

    /// Fetch one strategy, if stored.
    pub fn get(&mut self, code: u32) -> Result<Option<Strategy>, SolverError> {
        let key = to_hex(code);
        let chunk = match self.index.hash_to_chunk.get(&key) {
            Some(&c) => c,
            None => return Ok(None),
        };
        self.load_chunk(chunk)?;
        let loaded = self.cache.get(&chunk).expect("chunk just loaded");
        Ok(loaded.strategies.get(&key).cloned())
    }

    /// Store one strategy. A new key is assigned to the tail chunk; an
    /// existing key is rewritten where it lives.
    pub fn put(&mut self, code: u32, strategy: Strategy) -> Result<(), SolverError> {
        let key = to_hex(code);
        let chunk = match self.index.hash_to_chunk.get(&key) {
            Some(&c) => c,
            None => {
                let c = (self.index.total_states / self.index.chunk_size) as u32;
                self.index.hash_to_chunk.insert(key.clone(), c);
                self.index.total_states += 1;
                self.index.total_chunks = self.index.total_chunks.max(c as usize + 1);
                self.index_dirty = true;
                c
            }
        };
        self.load_chunk(chunk)?;
        let loaded = self.cache.get_mut(&chunk).expect("chunk just loaded");
        loaded.strategies.insert(key, strategy);
        loaded.count = loaded.strategies.len();
        self.dirty.insert(chunk);
        Ok(())
    }

    /// Write all dirty chunks and, if changed, the index.
    pub fn flush(&mut self) -> Result<(), SolverError> {
        let mut dirty: Vec<u32> = self.dirty.drain().collect();
        dirty.sort_unstable();
        for chunk in dirty {
            if let Some(loaded) = self.cache.peek(&chunk) {
                Self::write_chunk(&self.dir, loaded)?;
            }
        }
        if self.index_dirty {
            std::fs::create_dir_all(&self.dir).map_err(|e| SolverError::storage(&self.dir, e))?;
            let path = self.dir.join("index.json");
            let text =
                serde_json::to_string(&self.index).expect("index serialization cannot fail");
            std::fs::write(&path, text).map_err(|e| SolverError::storage(&path, e))?;
            self.index_dirty = false;
        }
        Ok(())
    }

    /// Bulk-load every stored value, bypassing the LRU. This is the
    /// successor oracle for the turn below: the whole turn is held as a
    /// flat map while that turn is being solved, then dropped.
    pub fn load_values(&self) -> Result<HashMap<u32, f64>, SolverError> {
        let mut values = HashMap::with_capacity(self.index.total_states);
        for chunk in 0..self.index.total_chunks as u32 {
            let loaded = self.read_chunk(chunk)?;
            for (key, strategy) in &loaded.strategies {
                if let Some(code) = from_hex(key) {
                    values.insert(code, strategy.value);
                }
            }
        }
        Ok(values)
    }
}

impl Drop for TurnStore {
    fn drop(&mut self) {
        if !self.dirty.is_empty() || self.index_dirty {
            if let Err(e) = self.flush() {
                eprintln!("Warning: failed to flush strategy store on drop: {}", e);
            }
        }
    }
}
