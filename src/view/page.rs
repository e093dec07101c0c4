//! Row paging for display

use std::ops::Range;

use crate::core::SurfaceMatrix;

/// One page of matrix rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPage {
    /// Zero-based page actually shown (after clamping)
    pub page: usize,
    /// Total pages, at least 1
    pub page_count: usize,
    /// Row indices on this page
    pub rows: Range<usize>,
}

impl RowPage {
    /// Page `page` of `page_size` rows. A zero page size puts every row on
    /// one page; a page past the end is clamped to the last one.
    pub fn of(matrix: &SurfaceMatrix, page: usize, page_size: usize) -> Self {
        Self::for_rows(matrix.dims().0, page, page_size)
    }

    pub fn for_rows(total_rows: usize, page: usize, page_size: usize) -> Self {
        if page_size == 0 || total_rows == 0 {
            return Self {
                page: 0,
                page_count: 1,
                rows: 0..total_rows,
            };
        }

        let page_count = total_rows.div_ceil(page_size);
        let page = page.min(page_count - 1);
        let start = page * page_size;
        let end = (start + page_size).min(total_rows);

        Self {
            page,
            page_count,
            rows: start..end,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.page_count
    }

    /// Page holding `row`, for jumping to the ATM strike
    pub fn containing(total_rows: usize, row: usize, page_size: usize) -> Self {
        if page_size == 0 {
            return Self::for_rows(total_rows, 0, 0);
        }
        Self::for_rows(total_rows, row / page_size, page_size)
    }
}
