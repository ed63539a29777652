use std::path::Path;

use electric_chair::config::{init_base_path, init_rayon_threads};
use electric_chair::constants::{DEFAULT_STATE_CHUNK_SIZE, STATE_HASHES_DIR};
use electric_chair::reachability::enumerate_all;

fn parse_args() -> usize {
    let args: Vec<String> = std::env::args().collect();
    let mut chunk_size = DEFAULT_STATE_CHUNK_SIZE;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--chunk-size" => {
                i += 1;
                if i < args.len() {
                    chunk_size = args[i].parse().unwrap_or_else(|_| {
                        eprintln!("Invalid --chunk-size value: {}", args[i]);
                        std::process::exit(1);
                    });
                }
            }
            "--help" | "-h" => {
                println!("Usage: electric-chair-enumerate [--chunk-size N]");
                println!();
                println!("Enumerates every reachable game state and writes the per-turn");
                println!("partitions under {}/.", STATE_HASHES_DIR);
                println!();
                println!("Options:");
                println!(
                    "  --chunk-size N  States per chunk file (default: {})",
                    DEFAULT_STATE_CHUNK_SIZE
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }
    if chunk_size == 0 {
        eprintln!("--chunk-size must be positive");
        std::process::exit(1);
    }
    chunk_size
}

fn main() {
    init_base_path();
    let chunk_size = parse_args();
    init_rayon_threads();

    println!("Electric Chair reachability enumeration");
    match enumerate_all(Path::new(STATE_HASHES_DIR), chunk_size) {
        Ok(metas) => {
            println!();
            println!("Turn | States   | Chunks");
            println!("-----|----------|-------");
            for meta in &metas {
                println!("  {:2} | {:8} | {:5}", meta.turn, meta.total_count, meta.chunks);
            }
        }
        Err(e) => {
            eprintln!("Enumeration failed: {}", e);
            std::process::exit(1);
        }
    }
}
