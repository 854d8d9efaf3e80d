//! Page thumbnails
//!
//! DjVu thumbnails are generated on the calling thread when a document
//! opens; PDF thumbnails come from a background worker and fill the strip
//! as they arrive.

mod strip;
mod worker;

pub use strip::{THUMBNAIL_WIDTH, Thumbnail, ThumbnailStrip, generate_blocking, render_thumbnail};
pub use worker::{ThumbnailMessage, ThumbnailWorker};
