//! fsm-replay - drive a table-defined state machine from stdin
//!
//! Each input line is either a command (`init`, `reset`, `conditions`,
//! `states`, `force <state>`, `send <state>`) or an event
//! `<channel> <index> <value>`. Everything the machine emits is printed,
//! one message per line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tablefsm::{Engine, EngineConfig, Output};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Replay channel events against a state machine definition
#[derive(Parser, Debug)]
#[command(name = "fsm-replay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory containing the states and transitions tables
    #[arg(default_value = "sm")]
    dir: PathBuf,

    /// Path to a JSON engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Diagnostic verbosity (0-6), overrides the config file
    #[arg(short, long)]
    verbosity: Option<u8>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print outputs as JSON objects
    #[arg(long)]
    json: bool,

    /// Enter the first state before reading input
    #[arg(long)]
    init: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(level) = cli.verbosity {
        config = config.with_verbosity(level);
    }

    let mut engine = Engine::load_dir(&cli.dir, config)
        .with_context(|| format!("loading state machine from {}", cli.dir.display()))?;
    if cli.init {
        engine.init();
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    flush(&mut engine, &mut stdout, cli.json)?;

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["init"] => engine.init(),
            ["reset"] => engine.reset(),
            ["conditions"] => {
                for (key, values) in engine.channels().iter() {
                    writeln!(stdout, "{key}: {values:?}")?;
                }
            }
            ["states"] => {
                writeln!(stdout, "{}", serde_json::to_string(&engine.report())?)?;
            }
            // Rejections are logged by the engine; the replay carries on.
            ["force", name] => {
                engine.force_transition(name).ok();
            }
            ["send", name] => {
                if let Err(err) = engine.send_actions(name) {
                    tracing::error!(error = %err, "cannot send actions");
                }
            }
            [key, index, value] => match (index.parse::<i64>(), value.parse::<f64>()) {
                (Ok(index), Ok(value)) => {
                    engine.handle_event(key, index, value).ok();
                }
                _ => tracing::error!("Usage: {key} [index] [value]"),
            },
            _ => tracing::error!(line = %line, "unrecognized input"),
        }
        flush(&mut engine, &mut stdout, cli.json)?;
    }
    Ok(())
}

fn flush(engine: &mut Engine, out: &mut impl Write, json: bool) -> Result<()> {
    for output in engine.drain_outputs() {
        if json {
            writeln!(out, "{}", serde_json::to_string(&output)?)?;
        } else {
            match output {
                Output::State(name) => writeln!(out, "state {name}")?,
                Output::Action(action) => writeln!(out, "action {action}")?,
            }
        }
    }
    out.flush()?;
    Ok(())
}
