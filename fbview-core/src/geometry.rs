/// Scroll granularity: one step is an eighth of the display.
pub const PAGE_STEPS: i32 = 8;

/// How far (in pixels) the page must stay visible at either edge.
pub const MARGIN: i32 = 1;

/// A position in the shared page/display coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub row: i32,
    pub col: i32,
}

impl Point {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    pub rows: i32,
    pub cols: i32,
}

impl Extent {
    pub const fn new(rows: i32, cols: i32) -> Self {
        Self { rows, cols }
    }

    /// Origin that centres a buffer of this size on (0, 0).
    pub fn centered_origin(&self) -> Point {
        Point::new(-self.rows / 2, -self.cols / 2)
    }
}

/// Clamps one axis of the display offset so that the window overlaps the
/// page by at least `margin` units.
///
/// The upper bound wins when the range is inverted, which only happens for
/// degenerate pages narrower than `2 * margin`.
pub fn clamp_offset(
    page_origin: i32,
    page_extent: i32,
    display_extent: i32,
    candidate: i32,
    margin: i32,
) -> i32 {
    let low = page_origin - display_extent + margin;
    let high = page_origin + page_extent - margin;
    low.max(high.min(candidate))
}

/// Applies [`clamp_offset`] to both axes.
pub fn clamp_point(page_origin: Point, page: Extent, display: Extent, candidate: Point) -> Point {
    Point::new(
        clamp_offset(page_origin.row, page.rows, display.rows, candidate.row, MARGIN),
        clamp_offset(page_origin.col, page.cols, display.cols, candidate.col, MARGIN),
    )
}
