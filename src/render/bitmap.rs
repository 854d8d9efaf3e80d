//! Decoded page pixels
//!
//! Every backend hands back the same fixed layout: packed 24-bit RGB,
//! row-major, no padding between rows.

use std::num::NonZeroU32;

use fast_image_resize as fir;
use image::RgbImage;

use super::RenderError;

/// Bytes per pixel of the packed RGB layout.
pub const CHANNELS: usize = 3;

/// Packed RGB pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Raw RGB pixel data (3 bytes per pixel: R, G, B)
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Bitmap {
    /// Wrap an existing buffer, checking that its length matches the dimensions.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        if width == 0 || height == 0 || pixels.len() != byte_len(width, height) {
            return Err(RenderError::InvalidSize { width, height });
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// A bitmap of the given size filled with one colour.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// RGB value at `(x, y)`, `None` outside the bitmap.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([self.pixels[at], self.pixels[at + 1], self.pixels[at + 2]])
    }

    /// Copy `src` into `self` with its top-left corner at `(x, y)`, clipping
    /// whatever falls outside.
    pub fn blit(&mut self, src: &Bitmap, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let copy_width = src.width.min(self.width - x) as usize;
        let copy_height = src.height.min(self.height - y) as usize;
        let dst_stride = self.row_bytes();
        let src_stride = src.row_bytes();
        let row_bytes = copy_width * CHANNELS;

        for row in 0..copy_height {
            let dst_start = (y as usize + row) * dst_stride + x as usize * CHANNELS;
            let src_start = row * src_stride;
            self.pixels[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src.pixels[src_start..src_start + row_bytes]);
        }
    }

    /// Extract a sub-rectangle; the rectangle is clipped to the bitmap.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Bitmap, RenderError> {
        let width = width.min(self.width.saturating_sub(x));
        let height = height.min(self.height.saturating_sub(y));
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }

        let stride = self.row_bytes();
        let row_bytes = width as usize * CHANNELS;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in y as usize..(y + height) as usize {
            let start = row * stride + x as usize * CHANNELS;
            pixels.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        Bitmap::from_raw(width, height, pixels)
    }

    /// Resample to exactly `width` x `height`.
    pub fn resized(&self, width: u32, height: u32) -> Result<Bitmap, RenderError> {
        if (width, height) == self.size() {
            return Ok(self.clone());
        }

        let invalid = || RenderError::InvalidSize { width, height };
        let src_width = NonZeroU32::new(self.width).ok_or_else(invalid)?;
        let src_height = NonZeroU32::new(self.height).ok_or_else(invalid)?;
        let dst_width = NonZeroU32::new(width).ok_or_else(invalid)?;
        let dst_height = NonZeroU32::new(height).ok_or_else(invalid)?;

        let src = fir::Image::from_vec_u8(
            src_width,
            src_height,
            self.pixels.clone(),
            fir::PixelType::U8x3,
        )
        .map_err(|e| RenderError::Resample(format!("source buffer: {e}")))?;
        let mut dst = fir::Image::new(dst_width, dst_height, fir::PixelType::U8x3);
        let mut resizer = fir::Resizer::new(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
        resizer
            .resize(&src.view(), &mut dst.view_mut())
            .map_err(|e| RenderError::Resample(e.to_string()))?;

        Bitmap::from_raw(width, height, dst.into_vec())
    }

    /// Resample to the largest size that fits within `max_width` x `max_height`
    /// while keeping the aspect ratio.
    pub fn fit_within(&self, max_width: u32, max_height: u32) -> Result<Bitmap, RenderError> {
        let (width, height) = fit_dimensions(self.size(), (max_width, max_height))
            .ok_or(RenderError::InvalidSize {
                width: max_width,
                height: max_height,
            })?;
        self.resized(width, height)
    }

    #[must_use]
    pub fn into_rgb_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
    }

    pub fn from_rgb_image(img: RgbImage) -> Result<Bitmap, RenderError> {
        let (width, height) = img.dimensions();
        Bitmap::from_raw(width, height, img.into_raw())
    }
}

/// Number of bytes a packed RGB bitmap of this size occupies.
#[must_use]
pub fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

/// Largest `(w, h)` with the aspect ratio of `src` that fits inside `bounds`.
///
/// At least one side of the result equals the matching side of `bounds`.
/// Returns `None` when either input has a zero side.
#[must_use]
pub fn fit_dimensions(src: (u32, u32), bounds: (u32, u32)) -> Option<(u32, u32)> {
    let (src_w, src_h) = src;
    let (max_w, max_h) = bounds;
    if src_w == 0 || src_h == 0 || max_w == 0 || max_h == 0 {
        return None;
    }

    // Width-limited when max_w / src_w <= max_h / src_h.
    let width_limited = u64::from(max_w) * u64::from(src_h) <= u64::from(max_h) * u64::from(src_w);
    if width_limited {
        let h = (f64::from(src_h) * f64::from(max_w) / f64::from(src_w)).round() as u32;
        Some((max_w, h.clamp(1, max_h)))
    } else {
        let w = (f64::from(src_w) * f64::from(max_h) / f64::from(src_h)).round() as u32;
        Some((w.clamp(1, max_w), max_h))
    }
}
