//! Page rendering
//!
//! Everything between a document handle and a display-ready bitmap:
//! the pixel buffer type, the scale policies, the decode cache and the
//! night-mode colour transform.

mod bitmap;
mod cache;
pub mod night;
mod renderer;

pub use bitmap::{Bitmap, CHANNELS, byte_len, fit_dimensions};
pub use cache::{CacheKey, PageCache};
pub use night::NightMode;
pub use renderer::{PageRenderer, RenderedPage, ScalePolicy, Viewport};

/// Errors from building or resampling bitmaps
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid bitmap size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("resample failed: {0}")]
    Resample(String),
}
