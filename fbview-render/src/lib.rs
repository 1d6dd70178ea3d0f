use std::env;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fbview_core::{rgb, DocumentBackend, DocumentProvider, PageImage, Pixel, RenderRequest};
use image::RgbaImage;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

/// Runtime override for the location of the pdfium shared library.
pub const PDFIUM_LIBRARY_ENV: &str = "FBVIEW_PDFIUM_LIBRARY_PATH";

pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_env() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

impl DocumentProvider for PdfiumProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>> {
        let document = PdfiumDocument::load(Arc::clone(&self.pdfium), path)?;
        debug!(path = %path.display(), pages = document.page_count, "opened document");
        Ok(Box::new(document))
    }
}

struct PdfiumDocument {
    // Declared before `_pdfium` so the document drops first.
    document: PdfDocument<'static>,
    last_render: Mutex<Option<(RenderRequest, PageImage)>>,
    page_count: usize,
    path: PathBuf,
    _pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    fn load(pdfium: Arc<Pdfium>, path: &Path) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("failed to open {:?}", path))?;
        // SAFETY: the document borrows the bindings owned by `pdfium`. The Arc is stored in
        // the same struct and `document` is declared first, so it is dropped while the
        // bindings are still alive.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        let page_count = usize::try_from(document.pages().len()).unwrap_or_default();
        Ok(Self {
            document,
            last_render: Mutex::new(None),
            page_count,
            path: path.to_path_buf(),
            _pdfium: pdfium,
        })
    }

    fn render_internal(&self, request: &RenderRequest) -> Result<PageImage> {
        let index = request
            .page
            .checked_sub(1)
            .and_then(|index| PdfPageIndex::try_from(index).ok())
            .ok_or_else(|| anyhow!("page {} is out of supported range", request.page))?;
        let page = self
            .document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", request.page))?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(request.scale().max(0.1))
            .rotate(quarter_turn(request.rotation), true);
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("failed to render page {}", request.page))?;
        rgba_to_page(&bitmap.as_image().to_rgba8())
    }
}

impl DocumentBackend for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn render_page(&self, request: RenderRequest) -> Result<PageImage> {
        {
            let cache = self.last_render.lock();
            if let Some((cached, image)) = cache.as_ref() {
                if *cached == request {
                    return Ok(image.clone());
                }
            }
        }

        let image = self.render_internal(&request)?;
        *self.last_render.lock() = Some((request, image.clone()));
        Ok(image)
    }
}

/// Maps degrees onto pdfium's quarter turns, rounding down.
pub fn quarter_turn(degrees: i32) -> PdfPageRenderRotation {
    match degrees.rem_euclid(360) / 90 {
        1 => PdfPageRenderRotation::Degrees90,
        2 => PdfPageRenderRotation::Degrees180,
        3 => PdfPageRenderRotation::Degrees270,
        _ => PdfPageRenderRotation::None,
    }
}

/// Repacks an RGBA raster into XRGB pixels, dropping alpha.
pub fn rgba_to_page(image: &RgbaImage) -> Result<PageImage> {
    let pixels: Vec<Pixel> = image
        .as_raw()
        .par_chunks_exact(4)
        .map(|px| rgb(px[0], px[1], px[2]))
        .collect();
    PageImage::new(image.height() as usize, image.width() as usize, pixels)
}

fn bind_pdfium_from_env() -> Option<Pdfium> {
    match env::var(PDFIUM_LIBRARY_ENV) {
        Ok(path) if !path.is_empty() => match Pdfium::bind_to_library(&path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!("failed to load Pdfium from {}={}: {}", PDFIUM_LIBRARY_ENV, path, err);
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; install it or set {} ({})",
                PDFIUM_LIBRARY_ENV,
                errors.join(", ")
            ))
        }
    }
}
