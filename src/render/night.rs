//! Night-mode colour transform
//!
//! Per pixel: RGB -> HSV, invert the value channel, rotate the hue by the
//! warmth level (degrees), back to RGB. Always applied to an original
//! bitmap, never to an already transformed one.

use rayon::prelude::*;

use super::bitmap::{Bitmap, CHANNELS};

/// Upper bound of the warmth slider.
pub const MAX_WARMTH: u8 = 100;

/// Warmth used when no preference has been stored yet.
pub const DEFAULT_WARMTH: u8 = 20;

/// Bitmaps with at least this many pixels are transformed row-parallel.
const PARALLEL_MIN_PIXELS: usize = 200_000;

/// Night-mode parameters for one render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NightMode {
    warmth: u8,
}

impl NightMode {
    #[must_use]
    pub fn new(warmth: u8) -> Self {
        Self {
            warmth: warmth.min(MAX_WARMTH),
        }
    }

    #[must_use]
    pub fn warmth(self) -> u8 {
        self.warmth
    }

    #[must_use]
    pub fn apply(self, bitmap: &Bitmap) -> Bitmap {
        apply(bitmap, self.warmth)
    }
}

/// Produce the night-mode version of `bitmap`. The only allocation is the
/// output buffer.
#[must_use]
pub fn apply(bitmap: &Bitmap, warmth: u8) -> Bitmap {
    let mut out = bitmap.clone();
    let hue_shift = u16::from(warmth.min(MAX_WARMTH));
    let pixel_count = bitmap.width as usize * bitmap.height as usize;
    let row_bytes = bitmap.row_bytes();

    if pixel_count >= PARALLEL_MIN_PIXELS && row_bytes > 0 {
        out.pixels
            .par_chunks_mut(row_bytes)
            .for_each(|row| transform_row(row, hue_shift));
    } else {
        transform_row(&mut out.pixels, hue_shift);
    }

    out
}

#[inline]
fn transform_row(row: &mut [u8], hue_shift: u16) {
    for px in row.chunks_exact_mut(CHANNELS) {
        let [r, g, b] = transform_pixel([px[0], px[1], px[2]], hue_shift);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}

#[inline]
fn transform_pixel(rgb: [u8; 3], hue_shift: u16) -> [u8; 3] {
    let (hue, saturation, value) = rgb_to_hsv(rgb);
    let value = 255 - value;
    match hue {
        Some(h) => hsv_to_rgb((h + hue_shift) % 360, saturation, value),
        None => [value, value, value],
    }
}

/// Hue in whole degrees (`None` for greys), saturation and value in 0..=255.
fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (Option<u16>, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if delta == 0 {
        return (None, 0, max);
    }

    let saturation = ((u32::from(delta) * 255 + u32::from(max) / 2) / u32::from(max)) as u8;

    let (r, g, b, d) = (f32::from(r), f32::from(g), f32::from(b), f32::from(delta));
    let max_f = f32::from(max);
    let mut hue = if max_f == r {
        60.0 * ((g - b) / d)
    } else if max_f == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    (Some(hue.round() as u16 % 360), saturation, max)
}

fn hsv_to_rgb(hue: u16, saturation: u8, value: u8) -> [u8; 3] {
    if saturation == 0 {
        return [value, value, value];
    }

    let v = f32::from(value);
    let chroma = v * f32::from(saturation) / 255.0;
    let sector = f32::from(hue % 360) / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let m = v - chroma;

    let (r, g, b) = match sector as u8 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let to_byte = |c: f32| (c + m).round().clamp(0.0, 255.0) as u8;
    [to_byte(r), to_byte(g), to_byte(b)]
}
