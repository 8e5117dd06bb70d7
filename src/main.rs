use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use feedkeys::config::{self, Config};
use feedkeys::help::help_lines;
use feedkeys::page::MemoryPage;
use feedkeys::replay::{self, ReplayScript};
use feedkeys::terminal;

#[derive(Parser)]
#[command(
    name = "feedkeys",
    about = "Keyboard shortcuts for a social feed page",
    version,
    long_version = env!("FEEDKEYS_LONG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to $XDG_CONFIG_HOME/feedkeys/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Leader key for two-key chords
    #[arg(long, global = true)]
    leader: Option<String>,

    /// How long the leader key waits for its second key, in milliseconds
    #[arg(long, global = true)]
    chord_timeout_ms: Option<u64>,

    /// Log output file path
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved shortcut table
    Keys,
    /// Run a replay script and print what happened
    Replay {
        /// Replay script (TOML)
        script: PathBuf,
    },
    /// Dispatch real key presses against a page description (Esc quits)
    Live {
        /// Page description (TOML)
        page: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        match std::fs::File::create(log_path) {
            Ok(file) => env_logger::Builder::from_default_env()
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init(),
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        }
    } else if !matches!(cli.command, Command::Live { .. }) {
        env_logger::init();
    }
    // live mode + no --log: logger not initialized (stderr would corrupt raw mode output)

    let result = load(&cli).and_then(|config| run(cli.command, &config));
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config_from(path, true)?,
        None => config::load_config()?,
    };
    cfg.merge_cli(cli.leader.clone(), cli.chord_timeout_ms);
    Ok(cfg.resolve())
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Keys => {
            for line in help_lines(&config.mapping(), &config.leader_key) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Replay { script } => {
            let script = ReplayScript::load(&script)?;
            let outcome = replay::run(&script, config)?;
            info!("replay: finished after {}ms", outcome.elapsed.as_millis());
            for line in outcome.lines() {
                println!("{line}");
            }
            Ok(())
        }
        Command::Live { page } => {
            let text = std::fs::read_to_string(&page)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", page.display()))?;
            let page = MemoryPage::from_toml(&text)?;
            terminal::run_live(page, config)
        }
    }
}
