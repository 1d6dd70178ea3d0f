//! Horizontal extent of the printed content on a rendered page.

use crate::{PageImage, BACKGROUND_PIXEL};

/// Rightmost column holding a non-background pixel on any row, or 0 for a
/// blank page.
///
/// Each row stops scanning once it reaches the best column found so far, so
/// the whole pass stays within `rows * cols` comparisons.
pub fn right_margin(page: &PageImage) -> usize {
    let mut right = 0;
    if page.cols == 0 {
        return right;
    }
    for row in 0..page.rows {
        let pixels = page.row(row);
        let mut col = page.cols - 1;
        while col > right && pixels[col] == BACKGROUND_PIXEL {
            col -= 1;
        }
        right = right.max(col);
    }
    right
}

/// Leftmost column holding a non-background pixel on any row, or the page
/// width for a blank page.
pub fn left_margin(page: &PageImage) -> usize {
    let mut left = page.cols;
    for row in 0..page.rows {
        let pixels = page.row(row);
        let mut col = 0;
        while col < left && pixels[col] == BACKGROUND_PIXEL {
            col += 1;
        }
        left = left.min(col);
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rgb;

    fn page_with_ink(rows: usize, cols: usize, ink: &[(usize, usize)]) -> PageImage {
        let mut page = PageImage::filled(rows, cols, BACKGROUND_PIXEL);
        for &(row, col) in ink {
            page.pixels[row * cols + col] = rgb(0, 0, 0);
        }
        page
    }

    #[test]
    fn blank_page_reports_full_width_and_zero() {
        let page = PageImage::filled(12, 40, BACKGROUND_PIXEL);
        assert_eq!(left_margin(&page), 40);
        assert_eq!(right_margin(&page), 0);
    }

    #[test]
    fn margins_span_content_over_all_rows() {
        let page = page_with_ink(5, 20, &[(0, 7), (2, 3), (3, 15), (4, 9)]);
        assert_eq!(left_margin(&page), 3);
        assert_eq!(right_margin(&page), 15);
    }

    #[test]
    fn ink_on_the_border_columns() {
        let page = page_with_ink(3, 10, &[(1, 0), (2, 9)]);
        assert_eq!(left_margin(&page), 0);
        assert_eq!(right_margin(&page), 9);
    }

    #[test]
    fn scan_leaves_page_untouched() {
        let page = page_with_ink(4, 8, &[(1, 2), (2, 5)]);
        let before = page.clone();
        let _ = left_margin(&page);
        let _ = right_margin(&page);
        assert_eq!(page, before);
    }

    #[test]
    fn empty_page_has_no_columns() {
        let page = PageImage::empty();
        assert_eq!(left_margin(&page), 0);
        assert_eq!(right_margin(&page), 0);
    }
}
