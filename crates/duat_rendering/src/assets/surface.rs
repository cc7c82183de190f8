//! Decoded image surfaces.

use std::sync::Arc;

use super::error::{LoadError, LoadResult};

/// A decoded image. Cloning shares the pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    bytes_per_pixel: u8,
    pixels: Arc<[u8]>,
}

impl Surface {
    /// Wraps decoded pixels, row-major, no padding.
    ///
    /// # Errors
    ///
    /// [`LoadError::Decode`] if the buffer length does not match the
    /// dimensions or a dimension is zero.
    pub fn new(width: u32, height: u32, bytes_per_pixel: u8, pixels: Vec<u8>) -> LoadResult<Self> {
        if width == 0 || height == 0 || bytes_per_pixel == 0 {
            return Err(LoadError::Decode(format!(
                "degenerate surface {width}x{height}x{bytes_per_pixel}"
            )));
        }
        let expected = u64::from(width) * u64::from(height) * u64::from(bytes_per_pixel);
        if pixels.len() as u64 != expected {
            return Err(LoadError::Decode(format!(
                "expected {expected} bytes for {width}x{height}x{bytes_per_pixel}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            pixels: pixels.into(),
        })
    }

    /// An RGBA surface filled with one color. Used for placeholders.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let count = width as usize * height as usize;
        let pixels: Vec<u8> = std::iter::repeat(rgba).take(count).flatten().collect();
        Self {
            width,
            height,
            bytes_per_pixel: 4,
            pixels: pixels.into(),
        }
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> u8 {
        self.bytes_per_pixel
    }

    /// Memory footprint of the pixel buffer.
    #[inline]
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.pixels.len() as u64
    }

    /// Raw pixel bytes.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The shared buffer. Holding a `Weak` to it observes the surface's
    /// lifetime without extending it.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &Arc<[u8]> {
        &self.pixels
    }

    /// Pixels as RGBA quads, when the surface is 4 bytes per pixel.
    #[must_use]
    pub fn as_rgba(&self) -> Option<&[[u8; 4]]> {
        if self.bytes_per_pixel != 4 {
            return None;
        }
        bytemuck::try_cast_slice(&self.pixels).ok()
    }

    /// Bytes of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = usize::from(self.bytes_per_pixel);
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        self.pixels.get(start..start + bpp)
    }

    /// Nearest-neighbour resample by `factor`. Factors at or above 1 return
    /// a shared clone; dimensions never drop below one pixel.
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        if !factor.is_finite() || factor >= 1.0 || factor <= 0.0 {
            return self.clone();
        }

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let scale = |n: u32| ((n as f32 * factor).round() as u32).max(1);
        let width = scale(self.width);
        let height = scale(self.height);
        if width == self.width && height == self.height {
            return self.clone();
        }

        let bpp = usize::from(self.bytes_per_pixel);
        let src_width = self.width as usize;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * bpp);
        for y in 0..height {
            let src_y = (u64::from(y) * u64::from(self.height) / u64::from(height)) as usize;
            for x in 0..width {
                let src_x = (u64::from(x) * u64::from(self.width) / u64::from(width)) as usize;
                let start = (src_y * src_width + src_x) * bpp;
                pixels.extend_from_slice(&self.pixels[start..start + bpp]);
            }
        }

        Self {
            width,
            height,
            bytes_per_pixel: self.bytes_per_pixel,
            pixels: pixels.into(),
        }
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_pixel", &self.bytes_per_pixel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Surface::new(2, 2, 4, vec![0; 16]).is_ok());
        assert!(matches!(
            Surface::new(2, 2, 4, vec![0; 15]),
            Err(LoadError::Decode(_))
        ));
        assert!(Surface::new(0, 2, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_solid_and_rgba_view() {
        let surface = Surface::solid(3, 2, [1, 2, 3, 4]);
        assert_eq!(surface.byte_size(), 24);
        let quads = surface.as_rgba().expect("rgba view");
        assert_eq!(quads.len(), 6);
        assert!(quads.iter().all(|q| *q == [1, 2, 3, 4]));
    }

    #[test]
    fn test_nearest_neighbour_downscale() {
        // 4x1 gradient, one byte per pixel
        let surface = Surface::new(4, 1, 1, vec![10, 20, 30, 40]).expect("valid");
        let half = surface.scaled(0.5);
        assert_eq!((half.width(), half.height()), (2, 1));
        assert_eq!(half.pixels(), &[10, 30]);

        let tiny = surface.scaled(0.01);
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
    }

    #[test]
    fn test_scale_one_shares_buffer() {
        let surface = Surface::solid(8, 8, [0; 4]);
        let same = surface.scaled(1.0);
        assert!(Arc::ptr_eq(surface.buffer(), same.buffer()));
    }

    #[test]
    fn test_pixel_lookup() {
        let surface = Surface::new(2, 2, 1, vec![1, 2, 3, 4]).expect("valid");
        assert_eq!(surface.pixel(1, 1), Some(&[4u8][..]));
        assert_eq!(surface.pixel(2, 0), None);
    }
}
