use std::sync::atomic::Ordering;

use electric_chair::analysis::{print_summary, Analyzer};
use electric_chair::config::{init_base_path, init_rayon_threads, Config};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mode {
    Solve,
    Init,
    Status,
    Clear,
    PrintConfig,
}

struct Args {
    mode: Mode,
    num: usize,
    draw_value: Option<f64>,
}

fn usage() -> ! {
    println!("Usage: electric-chair-analyze [OPTIONS]");
    println!();
    println!("Solves equilibrium strategies for enumerated states, deepest turn");
    println!("first. Without a mode flag, solves up to N states and exits.");
    println!();
    println!("Options:");
    println!("  -n, --num N           States to solve this run (default: 1000)");
    println!("  -i, --init            Initialize progress from reachability metadata");
    println!("  -s, --status          Print the progress summary");
    println!("  -c, --clear           Delete strategy outputs and reset progress");
    println!("      --config          Print the resolved configuration");
    println!("  -d, --draw-value F    Override the draw payoff (default: 0.0)");
    println!("  -h, --help            Show this help");
    std::process::exit(0);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut mode: Option<Mode> = None;
    let mut num = 1000usize;
    let mut draw_value = None;

    let set_mode = |current: &mut Option<Mode>, new: Mode| {
        if let Some(existing) = current {
            eprintln!(
                "Modes are mutually exclusive ({:?} given after {:?})",
                new, existing
            );
            std::process::exit(1);
        }
        *current = Some(new);
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--num" | "-n" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("--num requires a value");
                    std::process::exit(1);
                }
                num = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --num value: {}", args[i]);
                    std::process::exit(1);
                });
            }
            "--init" | "-i" => set_mode(&mut mode, Mode::Init),
            "--status" | "-s" => set_mode(&mut mode, Mode::Status),
            "--clear" | "-c" => set_mode(&mut mode, Mode::Clear),
            "--config" => set_mode(&mut mode, Mode::PrintConfig),
            "--draw-value" | "-d" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("--draw-value requires a value");
                    std::process::exit(1);
                }
                draw_value = Some(args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --draw-value value: {}", args[i]);
                    std::process::exit(1);
                }));
            }
            "--help" | "-h" => usage(),
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Args {
        mode: mode.unwrap_or(Mode::Solve),
        num,
        draw_value,
    }
}

fn main() {
    init_base_path();
    let args = parse_args();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(draw) = args.draw_value {
        config.evaluation.draw = draw;
    }

    if args.mode == Mode::PrintConfig {
        let text = serde_json::to_string_pretty(&config).expect("config serialization");
        println!("{}", text);
        return;
    }

    let analyzer = Analyzer::new(config);
    let result = match args.mode {
        Mode::Init => analyzer.initialize().map(|progress| {
            println!("Progress initialized.");
            print_summary(&progress);
        }),
        Mode::Status => analyzer.load_progress().map(|found| match found {
            Some(progress) => print_summary(&progress),
            None => println!("No progress record; run with --init first."),
        }),
        Mode::Clear => analyzer.clear().map(|()| {
            println!("Strategy outputs deleted, progress reset.");
        }),
        Mode::Solve => {
            init_rayon_threads();
            let stop = analyzer.stop_flag();
            if let Err(e) = ctrlc::set_handler(move || {
                eprintln!("\nStop requested, finishing current batch...");
                stop.store(true, Ordering::Relaxed);
            }) {
                eprintln!("Warning: could not install Ctrl-C handler: {}", e);
            }
            analyzer.run(args.num).map(|processed| {
                println!("Done: {} states processed this run.", processed);
            })
        }
        Mode::PrintConfig => unreachable!(),
    };

    if let Err(e) = result {
        eprintln!("Fatal: {}", e);
        std::process::exit(1);
    }
}
