//! Uniform grid over the viewport for culling.
//!
//! Rebuilt every frame: cleared, then every surviving particle is inserted
//! once. Cell vectors keep their capacity across frames, so a warmed-up grid
//! does not allocate.

use duat_core::PoolHandle;
use duat_shared::{Rect, Vec2};

/// Bucketed particle handles.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<PoolHandle>>,
    len: usize,
}

impl SpatialGrid {
    /// Creates a grid covering `width × height` pixels.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: u32) -> Self {
        assert!(cell_size > 0, "grid cell size must be non-zero");
        let cols = width.div_ceil(cell_size).max(1) as usize;
        let rows = height.div_ceil(cell_size).max(1) as usize;
        #[allow(clippy::cast_precision_loss)]
        let cell_size = cell_size as f32;
        Self {
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
            len: 0,
        }
    }

    /// Columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Handles inserted since the last clear.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Nothing inserted since the last clear?
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Empties every cell, keeping capacity.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.len = 0;
    }

    /// Column and row covering `position`.
    ///
    /// Coordinates outside the grid clamp to the nearest edge cell, so every
    /// particle lands in exactly one cell.
    #[must_use]
    pub fn cell_of(&self, position: Vec2) -> (usize, usize) {
        (
            Self::axis_cell(position.x, self.cell_size, self.cols),
            Self::axis_cell(position.y, self.cell_size, self.rows),
        )
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn axis_cell(coordinate: f32, cell_size: f32, count: usize) -> usize {
        let cell = (coordinate / cell_size).floor();
        if cell.is_nan() || cell <= 0.0 {
            0
        } else {
            (cell as usize).min(count - 1)
        }
    }

    /// Buckets `handle` by `position`.
    pub fn insert(&mut self, handle: PoolHandle, position: Vec2) {
        let (col, row) = self.cell_of(position);
        self.cells[row * self.cols + col].push(handle);
        self.len += 1;
    }

    /// Handles in one cell.
    #[must_use]
    pub fn cell(&self, col: usize, row: usize) -> &[PoolHandle] {
        if col >= self.cols || row >= self.rows {
            return &[];
        }
        &self.cells[row * self.cols + col]
    }

    /// Appends every handle in cells overlapping `view` to `out`.
    ///
    /// Cell-granular: callers wanting exact visibility filter the result.
    pub fn query(&self, view: Rect, out: &mut Vec<PoolHandle>) {
        let (start_col, start_row) = self.cell_of(Vec2::new(view.x, view.y));
        let (end_col, end_row) = self.cell_of(Vec2::new(view.right(), view.bottom()));
        for row in start_row..=end_row {
            let base = row * self.cols;
            for cell in &self.cells[base + start_col..=base + end_col] {
                out.extend_from_slice(cell);
            }
        }
    }
}
