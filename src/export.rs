//! DjVu to PDF export
//!
//! One A4 page per source page. Each source page is decoded at its native
//! resolution, embedded as a Flate-compressed RGB image, and scaled to fit
//! the A4 page with its top-left corner at the top-left of the sheet.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use log::{info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::cancel::CancelToken;
use crate::document::{DocumentError, DocumentKind, DocumentSource};
use crate::render::Bitmap;

/// A4 in PDF points.
pub const A4_WIDTH_PT: f32 = 595.0;
pub const A4_HEIGHT_PT: f32 = 842.0;

pub const NO_FILE_OPEN: &str = "No file is currently open.";
pub const NOT_DJVU: &str = "File is not a Djvu document.";
pub const EXPORT_DONE: &str = "Document exported as PDF successfully.";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("File is not a Djvu document.")]
    NotDjvu,

    #[error("export cancelled")]
    Cancelled,

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("PDF writer: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What an export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub pages: usize,
    /// Pages that could not be decoded and were left blank
    pub blank_pages: Vec<usize>,
}

/// `<dir>/<stem>.pdf` next to the source document.
#[must_use]
pub fn default_export_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    source.with_file_name(format!("{stem}.pdf"))
}

/// Append `.pdf` unless the name already ends with it (any case).
#[must_use]
pub fn ensure_pdf_extension(path: &Path) -> PathBuf {
    let has_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if has_pdf {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".pdf");
        PathBuf::from(name)
    }
}

/// Write every page of a DjVu `source` into a PDF at `output`.
///
/// `progress` receives `(done, total)` before each page; `cancel` is
/// checked after it, and a cancelled export writes nothing.
pub fn export_pdf(
    source: &dyn DocumentSource,
    output: &Path,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<ExportSummary, ExportError> {
    if source.kind() != DocumentKind::Djvu {
        return Err(ExportError::NotDjvu);
    }

    let output = ensure_pdf_extension(output);
    let count = source.page_count();
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(count);
    let mut blank_pages = Vec::new();

    for index in 0..count {
        progress(index, count);
        if cancel.is_cancelled() {
            info!("Export cancelled at page {index} of {count}");
            return Err(ExportError::Cancelled);
        }

        let bitmap = match source.render_page(index, 1.0) {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                warn!("Export: page {index} could not be decoded, leaving it blank: {e}");
                blank_pages.push(index);
                None
            }
        };
        let page_id = add_page(&mut doc, pages_id, bitmap.as_ref())?;
        kids.push(page_id.into());
    }
    progress(count, count);

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count as i64,
        "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH_PT.into(), A4_HEIGHT_PT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    doc.save(&output)?;
    info!("Exported {count} pages to {output:?}");

    Ok(ExportSummary {
        path: output,
        pages: count,
        blank_pages,
    })
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    bitmap: Option<&Bitmap>,
) -> Result<ObjectId, ExportError> {
    let mut operations = Vec::new();
    let mut resources = lopdf::Dictionary::new();

    if let Some(bitmap) = bitmap {
        let image_id = doc.add_object(image_stream(bitmap)?);
        resources.set("XObject", dictionary! { "Im0" => image_id });

        let (width, height) = placement(bitmap.size());
        operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    (A4_HEIGHT_PT - height).into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ];
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

fn image_stream(bitmap: &Bitmap) -> Result<Stream, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&bitmap.pixels)?;
    let compressed = encoder.finish()?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(bitmap.width),
        "Height" => i64::from(bitmap.height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    Ok(Stream::new(dict, compressed))
}

/// Size in points of an image of `size` pixels fitted into A4.
fn placement(size: (u32, u32)) -> (f32, f32) {
    let (w, h) = (size.0 as f32, size.1 as f32);
    let scale = (A4_WIDTH_PT / w).min(A4_HEIGHT_PT / h);
    (w * scale, h * scale)
}
