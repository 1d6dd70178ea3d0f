use std::path::Path;

use anyhow::{anyhow, Result};

pub mod cache;
pub mod command;
pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod margin;
pub mod marks;
pub mod navigator;
pub mod session;

pub use cache::PageCache;
pub use command::Command;
pub use compositor::{Compositor, DisplayBackend};
pub use config::{DisplayKind, ViewerConfig};
pub use error::{LoadError, ViewerError};
pub use geometry::{clamp_offset, Extent, Point};
pub use marks::{Mark, MarkStore};
pub use navigator::{LoopAction, Navigator, StartOptions, ViewState};
pub use session::{run_session, EventSource, ExitReason, InputEvent, StatusSink};

/// One display pixel in XRGB8888 layout.
pub type Pixel = u32;

/// Bytes per pixel every page buffer and display row uses.
pub const PIXEL_SIZE: usize = std::mem::size_of::<Pixel>();

/// Value written to display positions not covered by the page.
pub const BLANK_PIXEL: Pixel = 0;

/// Paper colour the margin scanner treats as empty.
pub const BACKGROUND_PIXEL: Pixel = rgb(255, 255, 255);

pub const fn rgb(r: u8, g: u8, b: u8) -> Pixel {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    /// 1-based page number.
    pub page: usize,
    /// Scale in tenths: 10 renders at 1:1.
    pub zoom: i32,
    /// Clockwise rotation in degrees.
    pub rotation: i32,
}

impl RenderRequest {
    pub fn scale(&self) -> f32 {
        self.zoom as f32 / 10.0
    }
}

/// Row-major raster of a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<Pixel>,
}

impl PageImage {
    pub fn new(rows: usize, cols: usize, pixels: Vec<Pixel>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(pixels.len()) {
            return Err(anyhow!(
                "page buffer holds {} pixels, expected {}x{}",
                pixels.len(),
                rows,
                cols
            ));
        }
        Ok(Self { rows, cols, pixels })
    }

    pub fn filled(rows: usize, cols: usize, value: Pixel) -> Self {
        Self {
            rows,
            cols,
            pixels: vec![value; rows * cols],
        }
    }

    pub fn empty() -> Self {
        Self::filled(0, 0, BLANK_PIXEL)
    }

    pub fn row(&self, index: usize) -> &[Pixel] {
        let start = index * self.cols;
        &self.pixels[start..start + self.cols]
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.rows as i32, self.cols as i32)
    }
}

/// An open document able to rasterize its pages.
pub trait DocumentBackend {
    fn page_count(&self) -> usize;
    fn render_page(&self, request: RenderRequest) -> Result<PageImage>;
}

/// Opens documents; used at startup and again for an explicit reload.
pub trait DocumentProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>>;
}
