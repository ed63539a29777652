//! Pipeline tests: enumerate a late-game closure, analyze it through the
//! real persistence layer, and check resume and idempotence behavior.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use electric_chair::analysis::Analyzer;
use electric_chair::config::Config;
use electric_chair::constants::NUM_CHAIRS;
use electric_chair::matrix_game::{build_payoff_matrix, verify_equilibrium};
use electric_chair::reachability::write_turn_partition;
use electric_chair::rules::step;
use electric_chair::state::{
    chairs_of, present_chairs, status_of, turn_of, GameState, Status,
};
use electric_chair::store::TurnStore;

/// A three-chair position two turns from the end of the game.
fn seed_state() -> GameState {
    GameState {
        turn: 13,
        chairs: (1 << 3) | (1 << 8) | (1 << 10), // chairs 4, 9, 11
        score_a: 15,
        score_b: 12,
        shock_a: 1,
        shock_b: 1,
    }
}

/// Expand the full closure of a position, partitioned by turn the way the
/// enumerator would record it (terminal successors keep their turn).
fn expand_closure(seed: u32) -> BTreeMap<u8, BTreeSet<u32>> {
    let mut partitions: BTreeMap<u8, BTreeSet<u32>> = BTreeMap::new();
    partitions.entry(turn_of(seed)).or_default().insert(seed);

    let mut frontier = vec![seed];
    while let Some(code) = frontier.pop() {
        if status_of(code) != Status::InProgress {
            continue;
        }
        let chairs = present_chairs(chairs_of(code));
        for &a in &chairs {
            for &b in &chairs {
                let next = step(code, a, b).unwrap().next;
                if partitions.entry(turn_of(next)).or_default().insert(next) {
                    frontier.push(next);
                }
            }
        }
    }
    partitions
}

fn write_partitions(dir: &Path, partitions: &BTreeMap<u8, BTreeSet<u32>>) {
    for (&turn, states) in partitions {
        write_turn_partition(dir, turn, states, 8).unwrap();
    }
}

fn make_analyzer(root: &Path) -> Analyzer {
    let mut config = Config::default();
    config.analysis.output_directory = root.join("analysis-results");
    config.analysis.max_batch_size = 7;
    config.analysis.save_interval = 3;
    Analyzer::with_hashes_dir(config, root.join("state-hashes"))
}

/// Every file under `dir`, keyed by relative path.
fn snapshot_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap().to_string_lossy().to_string();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

/// Parse progress.json bytes with the timestamp blanked out.
fn progress_without_timestamp(bytes: &[u8]) -> serde_json::Value {
    let mut value: serde_json::Value = serde_json::from_slice(bytes).unwrap();
    value["lastUpdated"] = serde_json::Value::Null;
    value
}

#[test]
fn full_pipeline_solves_every_state() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let partitions = expand_closure(seed_state().encode());
    let total: usize = partitions.values().map(|s| s.len()).sum();
    assert!(partitions.len() >= 3, "expected turns 13..=15");
    assert!(total > 10, "closure unexpectedly small: {}", total);
    write_partitions(&root.join("state-hashes"), &partitions);

    let analyzer = make_analyzer(root);
    analyzer.initialize().unwrap();
    let processed = analyzer.run(usize::MAX).unwrap();
    assert_eq!(processed, total);

    let progress = analyzer.load_progress().unwrap().unwrap();
    assert!(progress.is_complete);
    for (&turn, states) in &partitions {
        assert_eq!(progress.analyzed(turn), states.len());
        assert_eq!(progress.total(turn), states.len());
    }

    // Collect all stored values, checking the probability law on the way.
    let out_dir = root.join("analysis-results");
    let mut values: HashMap<u32, f64> = HashMap::new();
    for (&turn, states) in &partitions {
        let mut store = TurnStore::open(out_dir.join(format!("turn-{}", turn)), 1000).unwrap();
        for &code in states {
            let strategy = store.get(code).unwrap().expect("state not stored");
            assert!(strategy.is_calculated);
            assert!((-1.0..=1.0).contains(&strategy.value));
            values.insert(code, strategy.value);

            let in_progress = status_of(code) == Status::InProgress;
            for probs in [&strategy.p1_probs, &strategy.p2_probs] {
                assert_eq!(probs.len(), NUM_CHAIRS);
                let mass: f64 = probs.iter().sum();
                if in_progress {
                    assert!((mass - 1.0).abs() < 1e-6, "mass {} for {:x}", mass, code);
                } else {
                    assert_eq!(mass, 0.0);
                }
                for chair in 1..=NUM_CHAIRS as u8 {
                    let p = probs[chair as usize - 1];
                    assert!((0.0..=1.0).contains(&p));
                    if chairs_of(code) & (1 << (chair - 1)) == 0 {
                        assert_eq!(p, 0.0, "mass on removed chair {} of {:x}", chair, code);
                    }
                }
            }
        }
    }

    // Every in-progress strategy is an equilibrium of its own matrix.
    for states in partitions.values() {
        for &code in states {
            if status_of(code) != Status::InProgress {
                continue;
            }
            let (chairs, matrix) = build_payoff_matrix(code, &values, 0.0).unwrap();
            let mut store =
                TurnStore::open(out_dir.join(format!("turn-{}", turn_of(code))), 1000).unwrap();
            let strategy = store.get(code).unwrap().unwrap();
            let row: Vec<f64> = chairs
                .iter()
                .map(|&c| strategy.p1_probs[c as usize - 1])
                .collect();
            let col: Vec<f64> = chairs
                .iter()
                .map(|&c| strategy.p2_probs[c as usize - 1])
                .collect();
            verify_equilibrium(code, &matrix, &row, &col, strategy.value, 1e-5).unwrap();
        }
    }

    // Re-running a complete store is a no-op, down to the bytes.
    let before = snapshot_tree(&out_dir);
    let processed_again = analyzer.run(usize::MAX).unwrap();
    assert_eq!(processed_again, 0);
    assert_eq!(snapshot_tree(&out_dir), before);
}

#[test]
fn budgeted_resume_matches_single_pass() {
    let single = tempfile::tempdir().unwrap();
    let resumed = tempfile::tempdir().unwrap();

    let partitions = expand_closure(seed_state().encode());
    write_partitions(&single.path().join("state-hashes"), &partitions);
    write_partitions(&resumed.path().join("state-hashes"), &partitions);

    let one_shot = make_analyzer(single.path());
    one_shot.initialize().unwrap();
    one_shot.run(usize::MAX).unwrap();

    let incremental = make_analyzer(resumed.path());
    incremental.initialize().unwrap();
    let mut rounds = 0;
    loop {
        let processed = incremental.run(4).unwrap();
        if processed == 0 {
            break;
        }
        rounds += 1;
        assert!(rounds < 100, "resume loop did not converge");
    }
    assert!(rounds > 1, "budget never split the work");

    let a = snapshot_tree(&single.path().join("analysis-results"));
    let b = snapshot_tree(&resumed.path().join("analysis-results"));
    assert_eq!(
        a.keys().collect::<Vec<_>>(),
        b.keys().collect::<Vec<_>>(),
        "file sets differ"
    );
    for (name, bytes) in &a {
        if name == "progress.json" {
            assert_eq!(
                progress_without_timestamp(bytes),
                progress_without_timestamp(&b[name])
            );
        } else {
            assert_eq!(bytes, &b[name], "file {} differs between runs", name);
        }
    }
}
