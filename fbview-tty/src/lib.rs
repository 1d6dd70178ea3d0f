use std::io::Write;

use anyhow::Result;
use crossterm::cursor;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use fbview_core::StatusSink;

pub mod framebuffer;
pub mod input;
pub mod kitty;
pub mod signals;
pub mod terminal;
pub mod touch;

pub use framebuffer::{FramebufferDisplay, FramebufferGeometry};
pub use input::TtyInput;
pub use kitty::KittyDisplay;
pub use terminal::Terminal;

/// Writes the status report on the top terminal line.
pub struct TerminalStatus<W: Write> {
    writer: W,
}

impl<W: Write> TerminalStatus<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StatusSink for TerminalStatus<W> {
    fn show_status(&mut self, line: &str) -> Result<()> {
        write_status_line(&mut self.writer, line)
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, 0),
        Print(line),
        Clear(ClearType::UntilNewLine),
        Print('\r')
    )?;
    writer.flush()?;
    Ok(())
}
