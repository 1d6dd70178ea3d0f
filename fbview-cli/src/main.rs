use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use fbview_core::{
    run_session, DisplayBackend, DisplayKind, DocumentProvider, Extent, Navigator, PageCache,
    StartOptions, ViewerConfig, PIXEL_SIZE,
};
use fbview_render::PdfiumProvider;
use fbview_tty::{
    signals, write_status_line, FramebufferDisplay, KittyDisplay, Terminal, TerminalStatus,
    TtyInput,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "fbview",
    version,
    about = "Page through PDF documents on a framebuffer or kitty terminal"
)]
struct Args {
    /// Rotation in degrees
    #[arg(short = 'r', long = "rotate", allow_negative_numbers = true)]
    rotate: Option<i32>,

    /// Zoom in tenths; 10 renders at 100%
    #[arg(short = 'z', long = "zoom")]
    zoom: Option<i32>,

    /// Page to open (1-based); a cached last page takes precedence
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Rows between the page top and the screen top at startup
    #[arg(short = 'v', long = "offset", allow_negative_numbers = true)]
    offset: Option<i32>,

    /// Output device
    #[arg(long, value_enum)]
    display: Option<DisplayArg>,

    /// Framebuffer device node
    #[arg(long)]
    fbdev: Option<PathBuf>,

    /// Touch panel event device
    #[arg(long)]
    touch: Option<PathBuf>,

    /// Document to view
    file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DisplayArg {
    Framebuffer,
    Kitty,
}

impl From<DisplayArg> for DisplayKind {
    fn from(arg: DisplayArg) -> Self {
        match arg {
            DisplayArg::Framebuffer => DisplayKind::Framebuffer,
            DisplayArg::Kitty => DisplayKind::Kitty,
        }
    }
}

impl Args {
    fn apply(&self, config: &mut ViewerConfig) {
        if let Some(rotation) = self.rotate {
            config.rotation = rotation;
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        if let Some(page) = self.page {
            config.page = page;
        }
        if let Some(offset) = self.offset {
            config.vertical_offset = offset;
        }
        if let Some(display) = self.display {
            config.display = display.into();
        }
        if let Some(fbdev) = &self.fbdev {
            config.framebuffer = fbdev.clone();
        }
        if let Some(touch) = &self.touch {
            config.touch_device = touch.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "fbview", "fbview")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    let mut config = ViewerConfig::load(&project_dirs.config_dir().join("config.toml"))?;
    args.apply(&mut config);

    let cache = open_cache(&args.file);
    apply_cached_page(&mut config, cache.as_ref());

    let provider = PdfiumProvider::new()?;
    let mut display = open_display(&config)?;
    run_then_release(display.as_mut(), |display| {
        view(display, Box::new(provider), &args.file, &config, cache.as_ref())
    })
}

/// Opens the document on `display` and runs the session until it ends.
fn view(
    display: &mut dyn DisplayBackend,
    provider: Box<dyn DocumentProvider>,
    document: &Path,
    config: &ViewerConfig,
    cache: Option<&PageCache>,
) -> Result<()> {
    if display.pixel_size() != PIXEL_SIZE {
        bail!(
            "display uses {} bytes per pixel, only {}-byte XRGB is supported",
            display.pixel_size(),
            PIXEL_SIZE
        );
    }

    let extent = Extent::new(display.rows() as i32, display.cols() as i32);
    let mut navigator = Navigator::open(
        provider,
        document.to_path_buf(),
        StartOptions::from(config),
        extent,
    )?;

    write_status_line(&mut io::stdout(), &navigator.status_line())?;
    signals::install()?;
    let _terminal = Terminal::enter()?;
    let mut input = TtyInput::stdin(&config.touch_device, config.touch_midpoint)?;
    let mut status = TerminalStatus::new(io::stdout());

    let outcome = run_session(&mut navigator, &mut input, display, &mut status);

    if let Some(cache) = cache {
        if let Err(err) = cache.store(navigator.current_page()) {
            warn!(?err, "failed to store page cache");
        }
    }

    let reason = outcome?;
    info!(?reason, page = navigator.current_page(), "session ended");
    Ok(())
}

/// Runs `run` and releases `display` whether or not it succeeded.
fn run_then_release<F>(display: &mut dyn DisplayBackend, run: F) -> Result<()>
where
    F: FnOnce(&mut dyn DisplayBackend) -> Result<()>,
{
    let outcome = run(&mut *display);
    if let Err(err) = display.release() {
        warn!(?err, "failed to release display");
    }
    outcome
}

/// A cached last page overrides the configured start page.
fn apply_cached_page(config: &mut ViewerConfig, cache: Option<&PageCache>) {
    if let Some(page) = cache.and_then(cached_page) {
        config.page = page;
    }
}

fn open_cache(document: &Path) -> Option<PageCache> {
    match PageCache::for_document(document) {
        Ok(cache) => Some(cache),
        Err(err) => {
            warn!(?err, "page cache unavailable");
            None
        }
    }
}

fn cached_page(cache: &PageCache) -> Option<usize> {
    match cache.load() {
        Ok(page) => page,
        Err(err) => {
            warn!(?err, path = %cache.path().display(), "failed to read page cache");
            None
        }
    }
}

fn open_display(config: &ViewerConfig) -> Result<Box<dyn DisplayBackend>> {
    let display: Box<dyn DisplayBackend> = match config.display {
        DisplayKind::Framebuffer => Box::new(FramebufferDisplay::open(&config.framebuffer)?),
        DisplayKind::Kitty => Box::new(KittyDisplay::for_terminal()?),
    };
    Ok(display)
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "fbview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // the terminal is the display, so logs only go to the file
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use fbview_core::{DocumentBackend, PageImage, Pixel, RenderRequest};
    use tempfile::tempdir;

    struct Pages(usize);

    impl DocumentBackend for Pages {
        fn page_count(&self) -> usize {
            self.0
        }

        fn render_page(&self, request: RenderRequest) -> Result<PageImage> {
            Ok(PageImage::filled(50, 40, request.page as Pixel))
        }
    }

    impl DocumentProvider for Pages {
        fn open(&self, _path: &Path) -> Result<Box<dyn DocumentBackend>> {
            Ok(Box::new(Pages(self.0)))
        }
    }

    struct Screen {
        pixel_size: usize,
        released: bool,
    }

    impl Screen {
        fn new(pixel_size: usize) -> Self {
            Self {
                pixel_size,
                released: false,
            }
        }
    }

    impl DisplayBackend for Screen {
        fn rows(&self) -> usize {
            30
        }

        fn cols(&self) -> usize {
            40
        }

        fn pixel_size(&self) -> usize {
            self.pixel_size
        }

        fn commit_row(&mut self, _row: usize, _col: usize, _pixels: &[Pixel]) -> Result<()> {
            Ok(())
        }

        fn release(&mut self) -> Result<()> {
            self.released = true;
            Ok(())
        }
    }

    fn start_page_with_cache(content: &str) -> usize {
        let home = tempdir().unwrap();
        let cache = PageCache::under_home(home.path(), Path::new("/books/book.pdf")).unwrap();
        fs::write(cache.path(), content).unwrap();

        let mut config = ViewerConfig::default();
        apply_cached_page(&mut config, Some(&cache));
        let navigator = Navigator::open(
            Box::new(Pages(10)),
            PathBuf::from("/books/book.pdf"),
            StartOptions::from(&config),
            Extent::new(30, 40),
        )
        .unwrap();
        assert_eq!(navigator.current_page(), config.page);
        config.page
    }

    #[test]
    fn cached_page_sets_start_page() {
        assert_eq!(start_page_with_cache("7"), 7);
    }

    #[test]
    fn empty_or_zero_cache_opens_first_page() {
        assert_eq!(start_page_with_cache(""), 1);
        assert_eq!(start_page_with_cache("0"), 1);
    }

    #[test]
    fn cached_page_beats_page_flag() {
        let home = tempdir().unwrap();
        let cache = PageCache::under_home(home.path(), Path::new("book.pdf")).unwrap();
        cache.store(7).unwrap();
        let args = Args::try_parse_from(["fbview", "-p", "4", "book.pdf"]).unwrap();
        let mut config = ViewerConfig::default();
        args.apply(&mut config);
        apply_cached_page(&mut config, Some(&cache));
        assert_eq!(config.page, 7);

        apply_cached_page(&mut config, None);
        assert_eq!(config.page, 7);
    }

    #[test]
    fn display_is_released_when_viewing_fails() {
        let mut screen = Screen::new(PIXEL_SIZE);
        let result = run_then_release(&mut screen, |_| Err(anyhow!("terminal unavailable")));
        assert!(result.is_err());
        assert!(screen.released);
    }

    #[test]
    fn unsupported_pixel_depth_releases_display() {
        let mut screen = Screen::new(2);
        let config = ViewerConfig::default();
        let result = run_then_release(&mut screen, |display| {
            view(display, Box::new(Pages(3)), Path::new("book.pdf"), &config, None)
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("2 bytes per pixel"));
        assert!(screen.released);
    }

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let args = Args::try_parse_from([
            "fbview", "-r", "0", "-z", "15", "-p", "4", "-v", "-40", "--display", "kitty",
            "book.pdf",
        ])
        .unwrap();
        let mut config = ViewerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.rotation, 0);
        assert_eq!(config.zoom, 15);
        assert_eq!(config.page, 4);
        assert_eq!(config.vertical_offset, -40);
        assert_eq!(config.display, DisplayKind::Kitty);
        assert_eq!(config.default_zoom, 22);
        assert_eq!(args.file, PathBuf::from("book.pdf"));
    }

    #[test]
    fn document_path_is_required() {
        assert!(Args::try_parse_from(["fbview", "-z", "10"]).is_err());
    }
}
