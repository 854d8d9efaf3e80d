use std::path::PathBuf;

/// Errors from opening or decoding a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("document has no pages")]
    Empty,

    #[error("document is encrypted")]
    Locked,

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("DjVu decoder: {detail}")]
    Djvu { detail: String },

    #[error("image decode: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Bitmap(#[from] crate::render::RenderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub fn djvu(msg: impl Into<String>) -> Self {
        Self::Djvu { detail: msg.into() }
    }
}
