use std::io::{self, Stdout, Write};

use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::cursor;
use crossterm::terminal::{self, Clear, ClearType};
use fbview_core::{DisplayBackend, Pixel, PIXEL_SIZE};
use png::{BitDepth, ColorType, Encoder};
use tracing::info;

const CHUNK_SIZE: usize = 4096;

/// Terminal rows kept free above the image for the status line.
pub const STATUS_ROWS: u16 = 1;

/// A kitty graphics terminal used as a pixel display. Committed rows
/// accumulate in an RGBA frame that is sent as one PNG on `present`.
pub struct KittyDisplay<W: Write> {
    writer: W,
    rows: usize,
    cols: usize,
    frame: Vec<u8>,
    image_id: u32,
}

impl KittyDisplay<Stdout> {
    /// Sizes the display to the terminal window minus the status row.
    pub fn for_terminal() -> Result<Self> {
        let window = terminal::window_size()?;
        if window.width == 0 || window.height == 0 || window.rows == 0 {
            bail!("terminal does not report its size in pixels");
        }
        let cell_height = window.height / window.rows;
        let rows = window.height.saturating_sub(cell_height * STATUS_ROWS);
        info!(rows, cols = window.width, "kitty display sized from terminal");
        Ok(Self::new(io::stdout(), usize::from(rows), usize::from(window.width)))
    }
}

impl<W: Write> KittyDisplay<W> {
    pub fn new(writer: W, rows: usize, cols: usize) -> Self {
        Self {
            writer,
            rows,
            cols,
            frame: vec![0; rows * cols * 4],
            image_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// RGBA bytes of the frame as composited so far.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, self.cols as u32, self.rows as u32);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.frame)?;
        writer.finish()?;
        Ok(buffer)
    }

    fn transmit(&mut self, png: &[u8]) -> Result<()> {
        let encoded = BASE64.encode(png);
        let mut chunks = encoded.as_bytes().chunks(CHUNK_SIZE).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = u8::from(chunks.peek().is_some());
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},s={},v={},z=-1,m={}",
                    self.image_id, self.cols, self.rows, more
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", more)?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }
        Ok(())
    }
}

impl<W: Write> DisplayBackend for KittyDisplay<W> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn pixel_size(&self) -> usize {
        PIXEL_SIZE
    }

    fn commit_row(&mut self, row: usize, col: usize, pixels: &[Pixel]) -> Result<()> {
        if row >= self.rows || col + pixels.len() > self.cols {
            bail!("row {} outside {}x{} kitty frame", row, self.rows, self.cols);
        }
        let start = (row * self.cols + col) * 4;
        let target = &mut self.frame[start..start + pixels.len() * 4];
        for (out, &pixel) in target.chunks_exact_mut(4).zip(pixels) {
            out[0] = (pixel >> 16) as u8;
            out[1] = (pixel >> 8) as u8;
            out[2] = pixel as u8;
            out[3] = 0xff;
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Ok(());
        }
        let png = self.encode_png()?;
        // synchronized update so the old image never flickers out
        write!(self.writer, "\u{1b}[?2026h")?;
        crossterm::queue!(self.writer, cursor::MoveTo(0, STATUS_ROWS))?;
        self.transmit(&png)?;
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    fn reinit(&mut self) -> Result<()> {
        crossterm::execute!(self.writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=I,i={},q=2\u{1b}\\", self.image_id)?;
        crossterm::execute!(self.writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        Ok(())
    }
}
