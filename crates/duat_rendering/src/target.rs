//! Drawing target abstraction.
//!
//! The resource manager never owns a graphics API. Everything it draws goes
//! through [`RenderTarget`], which a backend implements over its own surface.

use duat_shared::Vec2;

use crate::assets::Surface;

/// RGBA color, straight alpha.
pub type Rgba = [u8; 4];

/// An opaque 2D drawing target.
pub trait RenderTarget {
    /// Draws a circle. `stroke == 0` fills it.
    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Rgba, stroke: u32);

    /// Draws an open polyline through `points`.
    fn draw_polyline(&mut self, points: &[Vec2], color: Rgba, width: u32);

    /// Copies `surface` with its top-left corner at `position`.
    fn blit(&mut self, surface: &Surface, position: Vec2);
}

/// Draw counters accumulated by [`HeadlessTarget`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCounts {
    /// Filled circles.
    pub filled_circles: u64,
    /// Stroked circles.
    pub rings: u64,
    /// Polylines.
    pub polylines: u64,
    /// Surface blits.
    pub blits: u64,
    /// Lowest alpha seen in any draw.
    pub min_alpha: u8,
}

impl DrawCounts {
    /// Every draw call issued.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.filled_circles + self.rings + self.polylines + self.blits
    }
}

/// A target that draws nothing and counts everything.
///
/// Used by headless runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessTarget {
    counts: DrawCounts,
}

impl HeadlessTarget {
    /// Creates an empty target.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counts: DrawCounts {
                filled_circles: 0,
                rings: 0,
                polylines: 0,
                blits: 0,
                min_alpha: u8::MAX,
            },
        }
    }

    /// Counters since creation or the last [`HeadlessTarget::reset`].
    #[inline]
    #[must_use]
    pub const fn counts(&self) -> DrawCounts {
        self.counts
    }

    /// Zeroes the counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn note_alpha(&mut self, color: Rgba) {
        self.counts.min_alpha = self.counts.min_alpha.min(color[3]);
    }
}

impl Default for HeadlessTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTarget for HeadlessTarget {
    fn draw_circle(&mut self, _center: Vec2, _radius: f32, color: Rgba, stroke: u32) {
        self.note_alpha(color);
        if stroke == 0 {
            self.counts.filled_circles += 1;
        } else {
            self.counts.rings += 1;
        }
    }

    fn draw_polyline(&mut self, _points: &[Vec2], color: Rgba, _width: u32) {
        self.note_alpha(color);
        self.counts.polylines += 1;
    }

    fn blit(&mut self, _surface: &Surface, _position: Vec2) {
        self.counts.blits += 1;
    }
}
