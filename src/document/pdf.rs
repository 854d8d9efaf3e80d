//! PDF backend (MuPDF)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap, TextPageFlags};

use super::{DocumentError, DocumentKind, DocumentSource, PageSize, PixelRect, SourceFactory};
use crate::render::Bitmap;

pub struct PdfSource {
    path: PathBuf,
    doc: Document,
    page_count: usize,
}

impl PdfSource {
    /// Open a PDF. Encrypted and page-less documents are refused.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let doc = Document::open(path.to_string_lossy().as_ref())?;
        if doc.needs_password()? {
            return Err(DocumentError::Locked);
        }

        let page_count = doc.page_count()?.max(0) as usize;
        if page_count == 0 {
            return Err(DocumentError::Empty);
        }

        debug!("Opened PDF {path:?} with {page_count} pages");
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            page_count,
        })
    }

    fn load_page(&self, page: usize) -> Result<Page, DocumentError> {
        self.check_page(page)?;
        Ok(self.doc.load_page(page as i32)?)
    }
}

impl DocumentSource for PdfSource {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, DocumentError> {
        let bounds = self.load_page(page)?.bounds()?;
        Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render_region(
        &self,
        page: usize,
        rect: PixelRect,
        scale: f32,
    ) -> Result<Bitmap, DocumentError> {
        let page = self.load_page(page)?;
        let transform = Matrix::new_scale(scale, scale);
        let pixmap = page.to_pixmap(&transform, &Colorspace::device_rgb(), false, false)?;
        let bitmap = pixmap_to_bitmap(&pixmap)?;

        if rect.covers(bitmap.size()) {
            Ok(bitmap)
        } else {
            Ok(bitmap.crop(rect.x, rect.y, rect.width, rect.height)?)
        }
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        let text_page = self.load_page(page)?.to_text_page(TextPageFlags::empty())?;
        let mut text = String::new();

        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                text.extend(line.chars().filter_map(|ch| ch.char()));
                text.push('\n');
            }
        }

        Ok(text)
    }

    fn reopen(&self) -> SourceFactory {
        let path = self.path.clone();
        Arc::new(move || Ok(Box::new(PdfSource::open(&path)?) as Box<dyn DocumentSource>))
    }
}

/// Copy pixmap samples into a packed RGB bitmap, dropping any extra channel
/// and the row padding.
fn pixmap_to_bitmap(pixmap: &Pixmap) -> Result<Bitmap, DocumentError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(DocumentError::Bitmap(crate::render::RenderError::Resample(
            format!("unsupported pixmap format: {n} channels"),
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(DocumentError::Bitmap(crate::render::RenderError::Resample(
            "pixmap buffer size mismatch".to_string(),
        )));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(Bitmap::from_raw(width as u32, height as u32, out)?)
}
