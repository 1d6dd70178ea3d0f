use anyhow::Result;

use crate::geometry::Point;
use crate::{PageImage, Pixel, BLANK_PIXEL};

/// Physical output that accepts composited rows.
pub trait DisplayBackend {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    /// Bytes per pixel of the device.
    fn pixel_size(&self) -> usize;
    fn commit_row(&mut self, row: usize, col: usize, pixels: &[Pixel]) -> Result<()>;

    /// Called once after every row of a frame has been committed.
    fn present(&mut self) -> Result<()> {
        Ok(())
    }

    /// Re-enters display mode after the process was suspended.
    fn reinit(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Copies the visible part of a page buffer onto the display one row at a
/// time through a reusable scratch row.
#[derive(Debug, Default)]
pub struct Compositor {
    scratch: Vec<Pixel>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redraw(
        &mut self,
        display: &mut dyn DisplayBackend,
        page: &PageImage,
        page_offset: Point,
        display_offset: Point,
    ) -> Result<()> {
        let rows = display.rows();
        let cols = display.cols();
        self.scratch.resize(cols, BLANK_PIXEL);
        for row in 0..rows {
            compose_row(
                &mut self.scratch,
                page,
                page_offset,
                display_offset,
                display_offset.row as i64 + row as i64,
            );
            display.commit_row(row, 0, &self.scratch)?;
        }
        display.present()
    }
}

/// Fills `out` with the page pixels that fall on display row `row` (in page
/// space); every other position becomes [`BLANK_PIXEL`].
pub fn compose_row(
    out: &mut [Pixel],
    page: &PageImage,
    page_offset: Point,
    display_offset: Point,
    row: i64,
) {
    out.fill(BLANK_PIXEL);

    let page_row = row - page_offset.row as i64;
    if page_row < 0 || page_row >= page.rows as i64 {
        return;
    }

    let display_col = display_offset.col as i64;
    let page_col = page_offset.col as i64;
    let begin = display_col.max(page_col);
    let end = (display_col + out.len() as i64).min(page_col + page.cols as i64);
    if begin >= end {
        return;
    }

    let len = (end - begin) as usize;
    let dst = (begin - display_col) as usize;
    let src = (begin - page_col) as usize;
    let source = page.row(page_row as usize);
    out[dst..dst + len].copy_from_slice(&source[src..src + len]);
}
