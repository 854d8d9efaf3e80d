//! Document library boundary
//!
//! Both backends sit behind [`DocumentSource`]; callers never name the
//! concrete variant. Dispatch happens once, in [`open_document`], by file
//! extension.

mod djvu;
mod error;
mod pdf;

use std::path::Path;
use std::sync::Arc;

pub use djvu::DjvuSource;
pub use error::DocumentError;
pub use pdf::PdfSource;

use crate::render::Bitmap;

/// Which decoding library owns a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Djvu,
    Pdf,
}

impl DocumentKind {
    /// Classify a path by its extension, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "djvu" | "djv" => Some(Self::Djvu),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Djvu => "DjVu",
            Self::Pdf => "PDF",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page dimensions in document units: points for PDF, pixels at the
/// native resolution for DjVu.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel size of the page rendered at `scale`, at least 1x1.
    #[must_use]
    pub fn scaled(self, scale: f32) -> (u32, u32) {
        (
            ((self.width * scale).round() as u32).max(1),
            ((self.height * scale).round() as u32).max(1),
        )
    }

    /// Page size rounded to whole pixels, at least 1x1.
    #[must_use]
    pub fn pixels(self) -> (u32, u32) {
        self.scaled(1.0)
    }
}

/// Pixel rectangle within a page rendered at some scale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole page at `(width, height)`.
    #[must_use]
    pub const fn full(size: (u32, u32)) -> Self {
        Self::new(0, 0, size.0, size.1)
    }

    #[must_use]
    pub fn covers(&self, size: (u32, u32)) -> bool {
        self.x == 0 && self.y == 0 && self.width >= size.0 && self.height >= size.1
    }
}

/// Opens an independent handle on the same document, for use on another thread.
pub type SourceFactory =
    Arc<dyn Fn() -> Result<Box<dyn DocumentSource>, DocumentError> + Send + Sync>;

/// An opened DjVu or PDF document.
///
/// Handles are not shared between threads; a worker that needs pages gets
/// its own handle through [`DocumentSource::reopen`]. Closing is `Drop`.
pub trait DocumentSource {
    fn kind(&self) -> DocumentKind;

    fn path(&self) -> &Path;

    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, DocumentError>;

    /// Render `rect` of the page as it would appear at `scale`.
    fn render_region(
        &self,
        page: usize,
        rect: PixelRect,
        scale: f32,
    ) -> Result<Bitmap, DocumentError>;

    /// Plain text of a page, for search.
    fn page_text(&self, page: usize) -> Result<String, DocumentError>;

    /// Native resolution in DPI, when the format records one.
    fn resolution(&self, _page: usize) -> Option<u32> {
        None
    }

    fn reopen(&self) -> SourceFactory;

    /// Render the whole page at `scale`.
    fn render_page(&self, page: usize, scale: f32) -> Result<Bitmap, DocumentError> {
        let size = self.page_size(page)?.scaled(scale);
        self.render_region(page, PixelRect::full(size), scale)
    }

    fn check_page(&self, page: usize) -> Result<(), DocumentError> {
        let count = self.page_count();
        if page < count {
            Ok(())
        } else {
            Err(DocumentError::PageOutOfRange { page, count })
        }
    }
}

/// Open `path` with the backend its extension selects.
pub fn open_document(path: &Path) -> Result<Box<dyn DocumentSource>, DocumentError> {
    match DocumentKind::from_path(path) {
        Some(DocumentKind::Djvu) => Ok(Box::new(DjvuSource::open(path)?)),
        Some(DocumentKind::Pdf) => Ok(Box::new(PdfSource::open(path)?)),
        None => Err(DocumentError::Unsupported(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_ignores_case() {
        assert_eq!(
            DocumentKind::from_path(Path::new("/books/a.DjVu")),
            Some(DocumentKind::Djvu)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("b.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_path(Path::new("c.epub")), None);
        assert_eq!(DocumentKind::from_path(Path::new("pdf")), None);
    }

    #[test]
    fn open_rejects_unknown_extension() {
        let err = open_document(Path::new("notes.txt")).err().unwrap();
        assert!(matches!(err, DocumentError::Unsupported(_)));
    }

    #[test]
    fn page_size_scaling_never_collapses() {
        let size = PageSize::new(612.0, 792.0);
        assert_eq!(size.scaled(1.0), (612, 792));
        assert_eq!(size.scaled(0.0), (1, 1));
    }

    #[test]
    fn full_rect_covers_page() {
        assert!(PixelRect::full((10, 20)).covers((10, 20)));
        assert!(!PixelRect::new(1, 0, 10, 20).covers((10, 20)));
    }
}
