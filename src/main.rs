//! bitris: falling-block puzzle on a packed bitboard, played in the terminal.

mod app;
mod board;
mod clock;
mod frontend;
mod game;
mod input;
mod piece;
mod scoring;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// Falling-block puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "bitris",
    version,
    about = "Falling-block puzzle on a 10x24 bitboard, played in the terminal.",
    long_about = "Stack falling pieces and clear full rows. Every four minutes the \
        level goes up, the board is wiped and pieces fall faster.\n\n\
        CONTROLS:\n  Left/j  Move left    Right/l  Move right   Up/k  Rotate\n  \
        Down    Soft drop    Space    Hard drop    Tab/p Pause   q  Quit"
)]
struct Args {
    /// Starting level; higher levels fall faster and score more.
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    level: u32,

    /// Seed for a reproducible piece sequence.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Write diagnostics to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log more detail (repeatable). Only used with --log-file.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// The terminal is in raw mode while playing, so logs only ever go to a file.
fn init_logging(args: &Args) -> Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(level_filter(args.verbose))
        .init();
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Put the terminal back first so the message is readable.
        let _ = app::restore_terminal();
        default_hook(panic_info);
    }));
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("failed to install signal handler")?;
    }
    install_panic_hook();

    info!(level = args.level, seed = ?args.seed, "starting");
    let outcome = App::new(args.level, args.seed, interrupted).run()?;
    println!("score: {} level: {}", outcome.score, outcome.level);
    Ok(())
}
