use std::io;

use anyhow::Result;
use crossterm::cursor;
use crossterm::terminal::{self, Clear, ClearType};
use tracing::debug;

/// Keeps the controlling terminal in raw mode with a hidden cursor; restores
/// it on drop.
pub struct Terminal;

impl Terminal {
    pub fn enter() -> Result<Self> {
        setup()?;
        debug!("terminal entered raw mode");
        Ok(Self)
    }

    /// Redoes the terminal setup after the process was stopped and continued.
    pub fn resume() -> Result<()> {
        // a stopped job may come back with cooked settings; crossterm skips the
        // switch when it believes raw mode is still on
        terminal::disable_raw_mode()?;
        setup()
    }
}

fn setup() -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide, Clear(ClearType::All))?;
    Ok(())
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show, crossterm::style::Print("\n"));
    }
}
