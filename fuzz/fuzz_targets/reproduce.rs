use std::path::PathBuf;
use std::time::Instant;

use feedkeys::config::Config;
use feedkeys::replay::{self, ReplayScript};
use log::info;

fn main() {
    env_logger::init();

    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        eprintln!("Usage: reproduce <replay-script.toml>");
        std::process::exit(1);
    });

    let script = ReplayScript::load(&path).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {e:#}", path.display());
        std::process::exit(1);
    });

    let iterations = std::env::var("ITERATIONS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);

    eprintln!(
        "=== Input: {} ({} steps), {} iteration(s) ===",
        path.display(),
        script.steps.len(),
        iterations
    );

    let config = Config::default();
    for i in 0..iterations {
        let iter_start = Instant::now();
        let outcome = match replay::run(&script, &config) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Replay error: {e:#}");
                std::process::exit(1);
            }
        };
        if i == 0 {
            for line in outcome.lines() {
                println!("{line}");
            }
        }
        info!(
            "iteration {}: {} entries, total {:.1}ms",
            i,
            outcome.entries.len(),
            iter_start.elapsed().as_secs_f64() * 1000.0
        );
    }
}
