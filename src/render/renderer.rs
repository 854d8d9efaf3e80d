//! Page renderer: document + page + scale policy + viewport -> bitmap
//!
//! Output size is decided first, from the page geometry and the policy.
//! The backend then decodes at whatever scale suits it and the result is
//! resampled to that size when the two disagree. DjVu decodes straight at
//! the output scale. PDF decodes at a DPI derived from the policy
//! (`scale x 150`) and is always resampled.

use log::{debug, warn};

use super::{Bitmap, CacheKey, PageCache, RenderError, fit_dimensions};
use crate::document::{DocumentError, DocumentKind, DocumentSource, PageSize};

/// Baseline DPI of PDF rasterisation at scale 1.0.
pub const PDF_BASE_DPI: f32 = 150.0;

/// Viewport width at which a fitted PDF page renders at scale 1.0.
pub const PDF_REFERENCE_WIDTH: f32 = 800.0;

const POINTS_PER_INCH: f32 = 72.0;

/// Cap on PDF decode size relative to the output, so high zoom factors
/// do not rasterise far more pixels than the resample keeps.
const PDF_MAX_OVERSAMPLE: f32 = 2.0;

/// How the output scale of a page is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalePolicy {
    /// Fixed factor of the page's native size.
    Explicit(f32),
    /// Largest size that fits the viewport.
    Fit,
    /// The fitted size multiplied by a zoom factor.
    Zoom(f32),
}

/// Visible area of the display, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn size(self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Viewport dimensions multiplied by `factor`, at least 1x1.
    #[must_use]
    pub fn scaled(self, factor: f32) -> (u32, u32) {
        (
            ((self.width as f32 * factor).round() as u32).max(1),
            ((self.height as f32 * factor).round() as u32).max(1),
        )
    }
}

/// A decoded page, before any night-mode transform.
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub page: usize,
    pub bitmap: Bitmap,
    /// Output pixels per page unit
    pub scale: f32,
}

impl RenderedPage {
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.bitmap.size()
    }
}

pub struct PageRenderer {
    cache: PageCache,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(PageCache::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: PageCache::new(capacity),
        }
    }

    /// Render `page`, or `None` when there is nothing to draw. Failures are
    /// logged; the caller keeps whatever it displayed before.
    pub fn render(
        &mut self,
        source: &dyn DocumentSource,
        page: usize,
        policy: ScalePolicy,
        viewport: Viewport,
    ) -> Option<RenderedPage> {
        match self.try_render(source, page, policy, viewport) {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                warn!("Rendering page {page} of {:?} failed: {e}", source.path());
                None
            }
        }
    }

    pub fn try_render(
        &mut self,
        source: &dyn DocumentSource,
        page: usize,
        policy: ScalePolicy,
        viewport: Viewport,
    ) -> Result<RenderedPage, DocumentError> {
        source.check_page(page)?;
        let page_size = source.page_size(page)?;
        let target = output_size(page_size, policy, viewport).ok_or(RenderError::InvalidSize {
            width: viewport.width,
            height: viewport.height,
        })?;
        let scale = target.0 as f32 / page_size.width.max(f32::EPSILON);

        let key = CacheKey::new(page, target);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(RenderedPage {
                page,
                bitmap: (*cached).clone(),
                scale,
            });
        }

        let decode_scale = decode_scale(source.kind(), page_size, policy, viewport, scale);
        let decoded = source.render_page(page, decode_scale)?;
        let bitmap = if decoded.size() == target {
            decoded
        } else {
            decoded.resized(target.0, target.1)?
        };
        debug!(
            "Rendered page {page} at {}x{} (decode scale {decode_scale:.3})",
            target.0, target.1
        );

        self.cache.insert(key, bitmap.clone());
        Ok(RenderedPage {
            page,
            bitmap,
            scale,
        })
    }

    /// Forget all decoded pages; the document changed.
    pub fn clear(&mut self) {
        self.cache.invalidate_all();
    }
}

/// Final bitmap size for a page under `policy`.
#[must_use]
pub fn output_size(page: PageSize, policy: ScalePolicy, viewport: Viewport) -> Option<(u32, u32)> {
    let valid = |f: f32| f.is_finite() && f > 0.0;
    match policy {
        ScalePolicy::Explicit(scale) if valid(scale) => Some(page.scaled(scale)),
        ScalePolicy::Fit if !viewport.is_empty() => fit_dimensions(page.pixels(), viewport.size()),
        ScalePolicy::Zoom(zoom) if valid(zoom) && !viewport.is_empty() => {
            fit_dimensions(page.pixels(), viewport.scaled(zoom))
        }
        _ => None,
    }
}

fn decode_scale(
    kind: DocumentKind,
    page: PageSize,
    policy: ScalePolicy,
    viewport: Viewport,
    output_scale: f32,
) -> f32 {
    let scale = match (kind, policy) {
        (_, ScalePolicy::Explicit(scale)) => scale,
        (DocumentKind::Djvu, _) => output_scale,
        (DocumentKind::Pdf, ScalePolicy::Fit) => {
            pdf_scale(viewport.width as f32 / PDF_REFERENCE_WIDTH, output_scale)
        }
        (DocumentKind::Pdf, ScalePolicy::Zoom(zoom)) => pdf_scale(zoom, output_scale),
    };
    // Never below one pixel on the long side.
    scale.max(1.0 / page.width.max(page.height).max(1.0))
}

fn pdf_scale(base: f32, output_scale: f32) -> f32 {
    (base * PDF_BASE_DPI / POINTS_PER_INCH).min(output_scale * PDF_MAX_OVERSAMPLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SyntheticSource;

    fn letter() -> PageSize {
        PageSize::new(612.0, 792.0)
    }

    #[test]
    fn fit_output_stays_within_viewport() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 3, letter());
        let mut renderer = PageRenderer::new();
        let viewport = Viewport::new(1024, 768);

        let page = renderer
            .render(&source, 1, ScalePolicy::Fit, viewport)
            .unwrap();
        let (w, h) = page.size();
        assert!(w <= 1024 && h <= 768);
        assert!(w == 1024 || h == 768);
    }

    #[test]
    fn pdf_fit_is_resampled_to_viewport() {
        let source = SyntheticSource::new(DocumentKind::Pdf, 2, letter());
        let mut renderer = PageRenderer::new();
        let page = renderer
            .render(&source, 0, ScalePolicy::Fit, Viewport::new(400, 300))
            .unwrap();
        assert_eq!(page.size(), (232, 300));
    }

    #[test]
    fn zoom_multiplies_fitted_size() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 1, PageSize::new(100.0, 100.0));
        let mut renderer = PageRenderer::new();
        let viewport = Viewport::new(200, 100);

        let fitted = renderer.render(&source, 0, ScalePolicy::Fit, viewport).unwrap();
        let zoomed = renderer
            .render(&source, 0, ScalePolicy::Zoom(2.0), viewport)
            .unwrap();
        assert_eq!(fitted.size(), (100, 100));
        assert_eq!(zoomed.size(), (200, 200));
    }

    #[test]
    fn explicit_scale_uses_native_size() {
        let source = SyntheticSource::new(DocumentKind::Pdf, 1, PageSize::new(100.0, 50.0));
        let mut renderer = PageRenderer::new();
        let page = renderer
            .render(&source, 0, ScalePolicy::Explicit(0.5), Viewport::default())
            .unwrap();
        assert_eq!(page.size(), (50, 25));
        assert!((page.scale - 0.5).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_page_is_nothing_to_draw() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 2, letter());
        let mut renderer = PageRenderer::new();
        assert!(renderer
            .render(&source, 2, ScalePolicy::Fit, Viewport::new(100, 100))
            .is_none());
    }

    #[test]
    fn empty_viewport_is_nothing_to_draw() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 2, letter());
        let mut renderer = PageRenderer::new();
        assert!(renderer
            .render(&source, 0, ScalePolicy::Fit, Viewport::new(0, 100))
            .is_none());
    }

    #[test]
    fn decode_failure_is_nothing_to_draw() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 3, letter()).failing_page(1);
        let mut renderer = PageRenderer::new();
        let viewport = Viewport::new(100, 100);
        assert!(renderer.render(&source, 1, ScalePolicy::Fit, viewport).is_none());
        assert!(renderer.render(&source, 2, ScalePolicy::Fit, viewport).is_some());
    }

    #[test]
    fn repeated_renders_hit_the_cache() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 2, letter());
        let mut renderer = PageRenderer::new();
        let viewport = Viewport::new(300, 300);

        let first = renderer.render(&source, 0, ScalePolicy::Fit, viewport).unwrap();
        let second = renderer.render(&source, 0, ScalePolicy::Fit, viewport).unwrap();
        assert_eq!(first.bitmap, second.bitmap);
        assert_eq!(source.decode_count(), 1);

        renderer.clear();
        let _ = renderer.render(&source, 0, ScalePolicy::Fit, viewport);
        assert_eq!(source.decode_count(), 2);
    }

    #[test]
    fn pdf_decode_scale_follows_reference_width() {
        let scale = decode_scale(
            DocumentKind::Pdf,
            letter(),
            ScalePolicy::Fit,
            Viewport::new(800, 600),
            10.0,
        );
        assert!((scale - 150.0 / 72.0).abs() < 1e-4);
    }

    #[test]
    fn pdf_decode_scale_is_capped() {
        let scale = decode_scale(
            DocumentKind::Pdf,
            letter(),
            ScalePolicy::Zoom(8.0),
            Viewport::new(800, 600),
            1.0,
        );
        assert!((scale - PDF_MAX_OVERSAMPLE).abs() < 1e-6);
    }
}
