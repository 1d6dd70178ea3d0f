use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::compositor::{Compositor, DisplayBackend};
use crate::config::ViewerConfig;
use crate::error::{LoadError, ViewerError};
use crate::geometry::{clamp_point, Extent, Point, PAGE_STEPS};
use crate::margin::{left_margin, right_margin};
use crate::marks::{Mark, MarkStore, PREVIOUS_MARK};
use crate::{DocumentBackend, DocumentProvider, PageImage, RenderRequest};

pub const MAX_ZOOM: i32 = 100;

/// Largest count prefix kept; further digits saturate here.
pub const MAX_COUNT: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    pub page: usize,
    pub zoom: i32,
    pub default_zoom: i32,
    pub rotation: i32,
    pub vertical_offset: i32,
}

impl From<&ViewerConfig> for StartOptions {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            page: config.page,
            zoom: config.zoom,
            default_zoom: config.default_zoom,
            rotation: config.rotation,
            vertical_offset: config.vertical_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub current_page: usize,
    pub zoom: i32,
    pub default_zoom: i32,
    pub rotation: i32,
    /// Top-left of the page buffer; centred on the origin after each load.
    pub page_offset: Point,
    /// Top-left of the display window.
    pub display_offset: Point,
    /// Pending count prefix, 0 when none was typed.
    pub count: i64,
    /// Page difference kept by `o`/`O` for `G` and `O`.
    pub anchor_diff: i64,
}

/// What the session loop does after a key has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    ContinueRedraw,
    ShowStatus,
    Sleep(Duration),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputState {
    Idle,
    AwaitingMark(MarkAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkAction {
    Set,
    Jump { exact_row: bool },
}

/// Owns the document, the current page buffer and the view, and turns key
/// presses into page loads and offset changes.
pub struct Navigator {
    provider: Box<dyn DocumentProvider>,
    path: PathBuf,
    document: Box<dyn DocumentBackend>,
    page_count: usize,
    page: PageImage,
    state: ViewState,
    marks: MarkStore,
    display: Extent,
    input: InputState,
    compositor: Compositor,
}

impl Navigator {
    pub fn open(
        provider: Box<dyn DocumentProvider>,
        path: PathBuf,
        options: StartOptions,
        display: Extent,
    ) -> Result<Self, ViewerError> {
        let document = open_document(provider.as_ref(), &path)?;
        let page_count = document.page_count();
        let mut navigator = Self {
            provider,
            path,
            document,
            page_count,
            page: PageImage::empty(),
            state: ViewState {
                current_page: 1,
                zoom: options.zoom.clamp(1, MAX_ZOOM),
                default_zoom: options.default_zoom,
                rotation: options.rotation,
                page_offset: Point::default(),
                display_offset: Point::default(),
                count: 0,
                anchor_diff: 0,
            },
            marks: MarkStore::new(),
            display,
            input: InputState::Idle,
            compositor: Compositor::new(),
        };

        let start = if (1..=page_count).contains(&options.page) {
            options.page
        } else {
            warn!(
                page = options.page,
                page_count, "start page out of range, opening first page"
            );
            1
        };
        if let Err(err) = navigator.load_page(start as i64) {
            warn!(%err, "failed to load start page");
        }
        navigator.state.display_offset = Point::new(
            navigator.state.page_offset.row + options.vertical_offset,
            -display.cols / 2,
        );
        navigator.clamp_view();
        info!(
            path = %navigator.path.display(),
            page = navigator.state.current_page,
            page_count,
            "document opened"
        );
        Ok(navigator)
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn page(&self) -> &PageImage {
        &self.page
    }

    pub fn marks(&self) -> &MarkStore {
        &self.marks
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.state.current_page
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while a mark command waits for its identifier key.
    pub fn awaiting_subcommand(&self) -> bool {
        self.input != InputState::Idle
    }

    pub fn status_line(&self) -> String {
        format!(
            "fbview:     file:{}  page:{}({})  zoom:{}% ",
            self.path.display(),
            self.state.current_page,
            self.page_count,
            self.state.zoom * 10
        )
    }

    pub fn redraw(&mut self, display: &mut dyn DisplayBackend) -> Result<(), ViewerError> {
        self.compositor
            .redraw(
                display,
                &self.page,
                self.state.page_offset,
                self.state.display_offset,
            )
            .map_err(|err| ViewerError::display(&err))
    }

    pub fn handle_key(&mut self, key: u8) -> Result<LoopAction, ViewerError> {
        match std::mem::replace(&mut self.input, InputState::Idle) {
            InputState::AwaitingMark(MarkAction::Set) => {
                self.set_mark(key);
                Ok(LoopAction::Continue)
            }
            InputState::AwaitingMark(MarkAction::Jump { exact_row }) => {
                if self.jump_mark(key, exact_row) {
                    self.clamp_view();
                    Ok(LoopAction::ContinueRedraw)
                } else {
                    Ok(LoopAction::Continue)
                }
            }
            InputState::Idle => {
                let command = Command::from_key(key);
                debug!(?command, count = self.state.count, "dispatch");
                self.dispatch(command)
            }
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<LoopAction, ViewerError> {
        let current = self.state.current_page as i64;
        let step = self.display.rows / PAGE_STEPS;
        let hstep = self.display.cols / PAGE_STEPS;

        match command {
            Command::Quit => return Ok(LoopAction::Quit),
            Command::ReloadDocument => return self.reload_document(),
            Command::SetAnchor => {
                self.state.anchor_diff = current - self.take_count(current);
                return Ok(LoopAction::Continue);
            }
            Command::SetDefaultZoom => {
                let zoom = self.take_count(self.state.zoom as i64);
                self.state.default_zoom = saturate(zoom);
                return Ok(LoopAction::Continue);
            }
            Command::ShowStatus => return Ok(LoopAction::ShowStatus),
            Command::CancelCount => {
                self.state.count = 0;
                return Ok(LoopAction::Continue);
            }
            Command::BeginSetMark => {
                self.input = InputState::AwaitingMark(MarkAction::Set);
                return Ok(LoopAction::Continue);
            }
            Command::BeginJumpMark { exact_row } => {
                self.input = InputState::AwaitingMark(MarkAction::Jump { exact_row });
                return Ok(LoopAction::Continue);
            }
            Command::Sleep => {
                let seconds = self.take_count(1).max(0) as u64;
                return Ok(LoopAction::Sleep(Duration::from_secs(seconds)));
            }
            Command::Digit(digit) => {
                self.state.count = self
                    .state
                    .count
                    .saturating_mul(10)
                    .saturating_add(digit as i64)
                    .min(MAX_COUNT);
                return Ok(LoopAction::Continue);
            }
            Command::Unknown(_) => return Ok(LoopAction::Continue),

            Command::NextPage => {
                let target = current + self.take_count(1);
                if !self.goto_page_top(target) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::PrevPage => {
                let target = current - self.take_count(1);
                if !self.goto_page_top(target) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::GotoPage => {
                self.set_mark(PREVIOUS_MARK as u8);
                let anchor = self.state.anchor_diff;
                let target = self.take_count(self.page_count as i64 - anchor) + anchor;
                if !self.goto_page_top(target) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::RelativeJump => {
                self.state.anchor_diff = current - self.take_count(current);
                self.set_mark(PREVIOUS_MARK as u8);
                if !self.goto_page_top(current + self.state.anchor_diff) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::Zoom => {
                let zoom = self.take_count(self.state.default_zoom as i64);
                if !self.zoom_page(zoom) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::FitWidth => {
                let zoom = self.state.zoom as i64;
                let cols = self.page.cols as i64;
                let target = if cols > 0 {
                    zoom * self.display.cols as i64 / cols
                } else {
                    zoom
                };
                if !self.zoom_page(target) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::FitContentWidth => {
                let left = left_margin(&self.page) as i64;
                let right = right_margin(&self.page) as i64;
                if left >= right {
                    return Ok(LoopAction::Continue);
                }
                let width = (self.display.cols - hstep) as i64;
                let target = self.state.zoom as i64 * width / (right - left);
                if !self.zoom_page(target) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::FitHeight => {
                let zoom = self.state.zoom as i64;
                let rows = self.page.rows as i64;
                let target = if rows > 0 {
                    zoom * self.display.rows as i64 / rows
                } else {
                    zoom
                };
                if !self.zoom_page(target) {
                    return Ok(LoopAction::Continue);
                }
            }
            Command::Rotate => {
                let previous = self.state.rotation;
                self.state.rotation = saturate(self.take_count(0));
                if !self.goto_page_top(current) {
                    self.state.rotation = previous;
                    return Ok(LoopAction::Continue);
                }
            }
            Command::ScrollDown => {
                let delta = step as i64 * self.take_count(1);
                self.shift_row(delta);
            }
            Command::ScrollUp => {
                let delta = step as i64 * self.take_count(1);
                self.shift_row(-delta);
            }
            Command::ScrollRight => {
                let delta = hstep as i64 * self.take_count(1);
                self.shift_col(delta);
            }
            Command::ScrollLeft => {
                let delta = hstep as i64 * self.take_count(1);
                self.shift_col(-delta);
            }
            Command::PageTop => self.state.display_offset.row = self.state.page_offset.row,
            Command::PageBottom => {
                self.state.display_offset.row =
                    self.state.page_offset.row + self.page.rows as i32 - self.display.rows;
            }
            Command::PageMiddle => {
                self.state.display_offset.row = self.state.page_offset.row
                    + self.page.rows as i32 / 2
                    - self.display.rows / 2;
            }
            Command::CenterColumn => self.state.display_offset.col = -self.display.cols / 2,
            Command::ScreenDown => {
                let delta = self.display.rows as i64 * self.take_count(1) - step as i64;
                self.shift_row(delta);
            }
            Command::ScreenUp => {
                let delta = self.display.rows as i64 * self.take_count(1) - step as i64;
                self.shift_row(-delta);
            }
            Command::PageLeftEdge => self.state.display_offset.col = self.state.page_offset.col,
            Command::PageRightEdge => {
                self.state.display_offset.col =
                    self.state.page_offset.col + self.page.cols as i32 - self.display.cols;
            }
            Command::ContentLeftEdge => {
                self.state.display_offset.col =
                    self.state.page_offset.col + left_margin(&self.page) as i32 - hstep / 2;
            }
            Command::ContentRightEdge => {
                self.state.display_offset.col = self.state.page_offset.col
                    + right_margin(&self.page) as i32
                    + hstep / 2
                    - self.display.cols;
            }
            Command::Repaint => {}
        }

        self.clamp_view();
        Ok(LoopAction::ContinueRedraw)
    }

    /// Returns the pending count, or `default` when none was typed, and
    /// clears it.
    fn take_count(&mut self, default: i64) -> i64 {
        let count = std::mem::take(&mut self.state.count);
        if count != 0 {
            count
        } else {
            default
        }
    }

    /// Rasterizes `page` with the current zoom and rotation and makes it the
    /// current page. On failure nothing changes.
    fn load_page(&mut self, page: i64) -> Result<(), LoadError> {
        if page < 1 || page > self.page_count as i64 {
            return Err(LoadError::OutOfRange {
                page,
                count: self.page_count,
            });
        }
        let page = page as usize;
        let request = RenderRequest {
            page,
            zoom: self.state.zoom,
            rotation: self.state.rotation,
        };
        let image = self
            .document
            .render_page(request)
            .and_then(|image| PageImage::new(image.rows, image.cols, image.pixels))
            .map_err(|err| LoadError::Render {
                page,
                reason: format!("{err:#}"),
            })?;

        self.page = image;
        self.state.page_offset = self.page.extent().centered_origin();
        self.state.current_page = page;
        Ok(())
    }

    fn try_load(&mut self, page: i64) -> bool {
        match self.load_page(page) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "page load refused");
                false
            }
        }
    }

    fn goto_page_top(&mut self, page: i64) -> bool {
        if !self.try_load(page) {
            return false;
        }
        self.state.display_offset.row = self.state.page_offset.row;
        true
    }

    /// Reloads at `zoom` (clamped to `1..=MAX_ZOOM`) and rescales the row
    /// offset so the same part of the page stays in view.
    fn zoom_page(&mut self, zoom: i64) -> bool {
        let previous = self.state.zoom;
        let zoom = zoom.clamp(1, MAX_ZOOM as i64) as i32;
        self.state.zoom = zoom;
        if !self.try_load(self.state.current_page as i64) {
            self.state.zoom = previous;
            return false;
        }
        let row = self.state.display_offset.row as i64 * zoom as i64 / previous as i64;
        self.state.display_offset.row = saturate(row);
        true
    }

    fn reload_document(&mut self) -> Result<LoopAction, ViewerError> {
        let document = open_document(self.provider.as_ref(), &self.path)?;
        self.page_count = document.page_count();
        self.document = document;
        info!(path = %self.path.display(), page_count = self.page_count, "document reloaded");
        if self.try_load(self.state.current_page as i64) {
            self.clamp_view();
            Ok(LoopAction::ContinueRedraw)
        } else {
            Ok(LoopAction::Continue)
        }
    }

    fn set_mark(&mut self, key: u8) {
        let mark = Mark {
            page: self.state.current_page,
            row: self.state.display_offset.row / self.state.zoom,
        };
        if !self.marks.set(key, mark) {
            debug!(key, "ignored invalid mark identifier");
        }
    }

    /// Jumps to the mark named by `key`, remembering the current position
    /// under the previous-position mark first.
    fn jump_mark(&mut self, key: u8, exact_row: bool) -> bool {
        let Some(mark) = self.marks.get(key) else {
            return false;
        };
        let row = if exact_row {
            saturate(mark.row as i64 * self.state.zoom as i64)
        } else {
            0
        };
        self.set_mark(PREVIOUS_MARK as u8);
        if !self.try_load(mark.page as i64) {
            return false;
        }
        self.state.display_offset.row = if exact_row {
            row
        } else {
            self.state.page_offset.row
        };
        true
    }

    fn shift_row(&mut self, delta: i64) {
        let row = self.state.display_offset.row as i64 + delta;
        self.state.display_offset.row = saturate(row);
    }

    fn shift_col(&mut self, delta: i64) {
        let col = self.state.display_offset.col as i64 + delta;
        self.state.display_offset.col = saturate(col);
    }

    fn clamp_view(&mut self) {
        self.state.display_offset = clamp_point(
            self.state.page_offset,
            self.page.extent(),
            self.display,
            self.state.display_offset,
        );
    }
}

fn open_document(
    provider: &dyn DocumentProvider,
    path: &Path,
) -> Result<Box<dyn DocumentBackend>, ViewerError> {
    let document = provider
        .open(path)
        .map_err(|err| ViewerError::open(path, &err))?;
    if document.page_count() == 0 {
        return Err(ViewerError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(document)
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
