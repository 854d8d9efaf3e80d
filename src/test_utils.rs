//! In-memory document for tests
//!
//! `SyntheticSource` behaves like an opened document without touching any
//! decoding library: page sizes, texts and failures are configured by the
//! test, and pixels are a deterministic function of page and position.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::document::{
    DocumentError, DocumentKind, DocumentSource, PageSize, PixelRect, SourceFactory,
};
use crate::render::Bitmap;

#[derive(Clone, Debug)]
struct Layout {
    kind: DocumentKind,
    path: PathBuf,
    sizes: Vec<PageSize>,
    texts: Vec<String>,
    failing: Vec<usize>,
    resolution: Option<u32>,
    decode_delay: Duration,
}

/// Fake document with configurable geometry
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    layout: Arc<Layout>,
    decodes: Arc<AtomicUsize>,
}

impl SyntheticSource {
    /// `page_count` pages of the same size.
    pub fn new(kind: DocumentKind, page_count: usize, size: PageSize) -> Self {
        Self::with_sizes(kind, vec![size; page_count])
    }

    pub fn with_sizes(kind: DocumentKind, sizes: Vec<PageSize>) -> Self {
        let path = match kind {
            DocumentKind::Djvu => PathBuf::from("synthetic.djvu"),
            DocumentKind::Pdf => PathBuf::from("synthetic.pdf"),
        };
        let texts = vec![String::new(); sizes.len()];
        Self {
            layout: Arc::new(Layout {
                kind,
                path,
                sizes,
                texts,
                failing: Vec::new(),
                resolution: None,
                decode_delay: Duration::ZERO,
            }),
            decodes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn edit(mut self, f: impl FnOnce(&mut Layout)) -> Self {
        f(Arc::make_mut(&mut self.layout));
        self
    }

    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.edit(|l| l.path = path)
    }

    pub fn with_text(self, page: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        self.edit(|l| {
            if let Some(slot) = l.texts.get_mut(page) {
                *slot = text;
            }
        })
    }

    pub fn with_resolution(self, dpi: u32) -> Self {
        self.edit(|l| l.resolution = Some(dpi))
    }

    /// Make every decode of `page` fail.
    pub fn failing_page(self, page: usize) -> Self {
        self.edit(|l| l.failing.push(page))
    }

    /// Sleep this long in every decode, to widen race windows.
    pub fn with_decode_delay(self, delay: Duration) -> Self {
        self.edit(|l| l.decode_delay = delay)
    }

    /// Number of decodes across this source and all its reopened handles.
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    /// Pixel colour of `page` at `(x, y)` of the full rendered page.
    pub fn pixel_at(page: usize, x: u32, y: u32) -> [u8; 3] {
        [
            (page as u32 * 37 + x * 3) as u8,
            (y * 5) as u8,
            (page as u32 * 11 + 60) as u8,
        ]
    }
}

impl DocumentSource for SyntheticSource {
    fn kind(&self) -> DocumentKind {
        self.layout.kind
    }

    fn path(&self) -> &Path {
        &self.layout.path
    }

    fn page_count(&self) -> usize {
        self.layout.sizes.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, DocumentError> {
        self.check_page(page)?;
        Ok(self.layout.sizes[page])
    }

    fn render_region(
        &self,
        page: usize,
        rect: PixelRect,
        scale: f32,
    ) -> Result<Bitmap, DocumentError> {
        let full = self.page_size(page)?.scaled(scale);
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if !self.layout.decode_delay.is_zero() {
            std::thread::sleep(self.layout.decode_delay);
        }
        if self.layout.failing.contains(&page) {
            return Err(DocumentError::djvu(format!("synthetic failure on page {page}")));
        }

        let width = rect.width.min(full.0.saturating_sub(rect.x));
        let height = rect.height.min(full.1.saturating_sub(rect.y));
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for y in rect.y..rect.y + height {
            for x in rect.x..rect.x + width {
                pixels.extend_from_slice(&Self::pixel_at(page, x, y));
            }
        }
        Ok(Bitmap::from_raw(width, height, pixels)?)
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        self.check_page(page)?;
        Ok(self.layout.texts[page].clone())
    }

    fn resolution(&self, _page: usize) -> Option<u32> {
        self.layout.resolution
    }

    fn reopen(&self) -> SourceFactory {
        let handle = self.clone();
        Arc::new(move || Ok(Box::new(handle.clone()) as Box<dyn DocumentSource>))
    }
}
