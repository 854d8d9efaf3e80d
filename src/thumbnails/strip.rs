//! Thumbnail storage
//!
//! Each page keeps its decoded original next to the bitmap actually shown.
//! The shown one is always rebuilt from the original, so night mode can be
//! toggled any number of times without decoding again or stacking
//! transforms.

use log::warn;

use crate::cancel::CancelToken;
use crate::document::{DocumentError, DocumentSource};
use crate::render::{Bitmap, NightMode};

/// Width of every thumbnail; height follows the page aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thumbnail {
    /// As decoded, never colour transformed
    pub original: Bitmap,
    /// `original` with the current night mode applied
    pub display: Bitmap,
}

impl Thumbnail {
    #[must_use]
    pub fn new(original: Bitmap, night: Option<NightMode>) -> Self {
        let display = derive_display(&original, night);
        Self { original, display }
    }

    pub fn refresh(&mut self, night: Option<NightMode>) {
        self.display = derive_display(&self.original, night);
    }
}

fn derive_display(original: &Bitmap, night: Option<NightMode>) -> Bitmap {
    match night {
        Some(night) => night.apply(original),
        None => original.clone(),
    }
}

/// Thumbnails of the open document, addressed by page index.
///
/// Slots fill in any order; a page that has not arrived (or failed) is
/// `None`.
#[derive(Clone, Debug, Default)]
pub struct ThumbnailStrip {
    slots: Vec<Option<Thumbnail>>,
    night: Option<NightMode>,
}

impl ThumbnailStrip {
    #[must_use]
    pub fn new(page_count: usize, night: Option<NightMode>) -> Self {
        Self {
            slots: vec![None; page_count],
            night,
        }
    }

    /// Store the thumbnail of `page`, growing the strip when needed.
    pub fn insert(&mut self, page: usize, original: Bitmap) {
        if page >= self.slots.len() {
            self.slots.resize(page + 1, None);
        }
        self.slots[page] = Some(Thumbnail::new(original, self.night));
    }

    /// Switch night mode and re-derive every display bitmap.
    pub fn set_night(&mut self, night: Option<NightMode>) {
        self.night = night;
        for thumb in self.slots.iter_mut().flatten() {
            thumb.refresh(night);
        }
    }

    #[must_use]
    pub fn night(&self) -> Option<NightMode> {
        self.night
    }

    #[must_use]
    pub fn get(&self, page: usize) -> Option<&Thumbnail> {
        self.slots.get(page)?.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of pages whose thumbnail has arrived.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Thumbnail)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(page, slot)| slot.as_ref().map(|t| (page, t)))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Decode one page at thumbnail width.
pub fn render_thumbnail(source: &dyn DocumentSource, page: usize) -> Result<Bitmap, DocumentError> {
    let size = source.page_size(page)?;
    let scale = THUMBNAIL_WIDTH as f32 / size.width.max(1.0);
    let bitmap = source.render_page(page, scale)?;
    if bitmap.width == THUMBNAIL_WIDTH {
        return Ok(bitmap);
    }

    let height = (f64::from(bitmap.height) * f64::from(THUMBNAIL_WIDTH) / f64::from(bitmap.width))
        .round()
        .max(1.0) as u32;
    Ok(bitmap.resized(THUMBNAIL_WIDTH, height)?)
}

/// Fill `strip` from `source` on the calling thread, page by page. Pages
/// that fail to decode stay empty. Returns false when cancelled.
pub fn generate_blocking(
    source: &dyn DocumentSource,
    strip: &mut ThumbnailStrip,
    cancel: &CancelToken,
) -> bool {
    for page in 0..source.page_count() {
        if cancel.is_cancelled() {
            return false;
        }
        match render_thumbnail(source, page) {
            Ok(bitmap) => strip.insert(page, bitmap),
            Err(e) => warn!("Thumbnail for page {page} failed: {e}"),
        }
    }
    true
}
