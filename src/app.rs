//! App: terminal mode guard and session wiring.

use crate::clock::SystemClock;
use crate::game::{Outcome, Session};
use crate::ui::TerminalFrontend;
use anyhow::Result;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to prepare terminal")]
    Setup(#[source] io::Error),
    #[error("failed to restore terminal")]
    Restore(#[source] io::Error),
}

/// Raw mode, alternate screen and hidden cursor for as long as the guard lives.
#[derive(Debug)]
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn acquire() -> Result<Self, TerminalError> {
        enable_raw_mode().map_err(TerminalError::Setup)?;
        if let Err(err) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
            return Err(TerminalError::Setup(err));
        }
        debug!("terminal acquired");
        Ok(Self { active: true })
    }

    pub fn restore(mut self) -> Result<(), TerminalError> {
        self.active = false;
        restore_terminal().map_err(TerminalError::Restore)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            if let Err(err) = restore_terminal() {
                warn!(%err, "terminal restore on drop failed");
            }
        }
    }
}

/// Undo everything `TerminalGuard::acquire` did. Also used by the panic hook.
pub fn restore_terminal() -> io::Result<()> {
    // Leave the alternate screen even if raw mode can't be turned off.
    let screen = execute!(io::stdout(), Show, LeaveAlternateScreen);
    disable_raw_mode()?;
    screen
}

pub struct App {
    level: u32,
    seed: Option<u64>,
    interrupted: Arc<AtomicBool>,
}

impl App {
    pub fn new(level: u32, seed: Option<u64>, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            level,
            seed,
            interrupted,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Take over the terminal, play one session and hand the terminal back.
    pub fn run(self) -> Result<Outcome> {
        let rng = self.rng();
        let guard = TerminalGuard::acquire()?;
        let terminal = DefaultTerminal::new(CrosstermBackend::new(io::stdout()))
            .map_err(TerminalError::Setup)?;
        let frontend = TerminalFrontend::new(terminal, Arc::clone(&self.interrupted));

        let outcome = Session::new(frontend, SystemClock, rng, self.level).run();
        guard.restore()?;

        let outcome = outcome?;
        info!(
            reason = ?outcome.reason,
            score = outcome.score,
            level = outcome.level,
            "session finished"
        );
        Ok(outcome)
    }
}
