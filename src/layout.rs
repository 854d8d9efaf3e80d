//! Display surface assembly
//!
//! Turns `(ViewState, document, viewport)` into the one thing the UI shows.
//! Night mode is applied to every page on its own before pages are put
//! together, so spreads and strips of differently sized pages transform
//! exactly like single pages do.

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::document::DocumentSource;
use crate::render::{Bitmap, NightMode, PageRenderer, RenderedPage, ScalePolicy, Viewport};
use crate::view::{LayoutMode, ViewState};

/// Vertical gap between pages in continuous mode.
pub const PAGE_SPACING: u32 = 10;
/// Horizontal room left beside pages in continuous mode.
pub const CONTINUOUS_MARGIN: u32 = 20;
/// Backdrop behind continuous pages (#1a1a1a).
pub const STRIP_BACKGROUND: [u8; 3] = [0x1a, 0x1a, 0x1a];
/// Fill for the unused part of a facing spread.
pub const SPREAD_BACKGROUND: [u8; 3] = [0, 0, 0];

pub const LEFT_PAGE_FAILED: &str = "Cannot render left page.";

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Cannot render left page.")]
    LeftPageUnavailable { page: usize },
}

/// What the UI presents
#[derive(Clone, Debug, Default)]
pub enum Surface {
    /// Nothing to draw; keep showing what was there
    #[default]
    Empty,
    Single(RenderedPage),
    Continuous(PageStrip),
    Facing(FacingSpread),
}

impl Surface {
    /// Content size in pixels, for scrolling.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Empty => (0, 0),
            Self::Single(page) => page.size(),
            Self::Continuous(strip) => (strip.width, strip.height),
            Self::Facing(spread) => spread.bitmap.size(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The surface as a single bitmap.
    #[must_use]
    pub fn to_bitmap(&self) -> Option<Bitmap> {
        match self {
            Self::Empty => None,
            Self::Single(page) => Some(page.bitmap.clone()),
            Self::Continuous(strip) => strip.flatten(),
            Self::Facing(spread) => Some(spread.bitmap.clone()),
        }
    }
}

/// Every page of the document stacked vertically at one width
#[derive(Clone, Debug, Default)]
pub struct PageStrip {
    pub pages: Vec<RenderedPage>,
    /// Top edge of each entry in `pages`
    pub offsets: Vec<u32>,
    pub width: u32,
    pub height: u32,
    /// False when the render was cancelled before the last page
    pub complete: bool,
}

impl PageStrip {
    fn push(&mut self, page: RenderedPage) {
        let top = if self.pages.is_empty() {
            0
        } else {
            self.height + PAGE_SPACING
        };
        let (w, h) = page.size();
        self.offsets.push(top);
        self.width = self.width.max(w);
        self.height = top + h;
        self.pages.push(page);
    }

    /// Index of the page shown at vertical position `y`; gaps belong to
    /// the page above them.
    #[must_use]
    pub fn page_at(&self, y: u32) -> Option<usize> {
        let slot = self.offsets.partition_point(|&top| top <= y).checked_sub(1)?;
        Some(self.pages[slot].page)
    }

    /// Top edge of `page`, if it was rendered.
    #[must_use]
    pub fn offset_of(&self, page: usize) -> Option<u32> {
        self.pages
            .iter()
            .position(|p| p.page == page)
            .map(|slot| self.offsets[slot])
    }

    /// Paint the strip onto one bitmap, pages centred horizontally.
    #[must_use]
    pub fn flatten(&self) -> Option<Bitmap> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let mut canvas = Bitmap::filled(self.width, self.height, STRIP_BACKGROUND);
        for (page, &top) in self.pages.iter().zip(&self.offsets) {
            let left = (self.width - page.bitmap.width) / 2;
            canvas.blit(&page.bitmap, left, top);
        }
        Some(canvas)
    }
}

/// Two pages side by side, fitted to the viewport
#[derive(Clone, Debug)]
pub struct FacingSpread {
    pub bitmap: Bitmap,
    pub left: usize,
    pub right: Option<usize>,
}

/// Build the surface for the current layout mode.
///
/// `progress` is called with `(done, total)` before each page of a
/// continuous render and is where a UI pumps its event loop; `cancel` is
/// checked right after it.
pub fn compose(
    renderer: &mut PageRenderer,
    source: &dyn DocumentSource,
    state: &ViewState,
    viewport: Viewport,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<Surface, LayoutError> {
    let night = state.night();
    match state.layout {
        LayoutMode::Single => Ok(renderer
            .render(source, state.current_page, state.scale_policy(), viewport)
            .map(|page| Surface::Single(with_night(page, night)))
            .unwrap_or_default()),
        LayoutMode::Continuous => Ok(Surface::Continuous(compose_continuous(
            renderer, source, night, viewport, cancel, progress,
        ))),
        LayoutMode::Facing => {
            compose_facing(renderer, source, state, viewport).map(Surface::Facing)
        }
    }
}

/// Render every page at `viewport.width - margin` wide and stack them.
/// Pages that fail to render are left out. Cancelling keeps the pages
/// finished so far.
pub fn compose_continuous(
    renderer: &mut PageRenderer,
    source: &dyn DocumentSource,
    night: Option<NightMode>,
    viewport: Viewport,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(usize, usize),
) -> PageStrip {
    let count = source.page_count();
    let target_width = viewport.width.saturating_sub(CONTINUOUS_MARGIN).max(1);
    let mut strip = PageStrip {
        complete: true,
        ..PageStrip::default()
    };

    for index in 0..count {
        progress(index, count);
        if cancel.is_cancelled() {
            info!("Continuous render cancelled after {index} of {count} pages");
            strip.complete = false;
            break;
        }

        let Ok(size) = source.page_size(index) else {
            continue;
        };
        let scale = target_width as f32 / size.width.max(1.0);
        if let Some(page) = renderer.render(source, index, ScalePolicy::Explicit(scale), viewport) {
            strip.push(with_night(page, night));
        }
    }
    if strip.complete {
        progress(count, count);
    }

    debug!(
        "Continuous strip: {} pages, {}x{}",
        strip.pages.len(),
        strip.width,
        strip.height
    );
    strip
}

/// Render the spread containing the current page. Both pages are fitted to
/// the viewport, laid out left to right on black, and the result fitted to
/// the viewport again.
pub fn compose_facing(
    renderer: &mut PageRenderer,
    source: &dyn DocumentSource,
    state: &ViewState,
    viewport: Viewport,
) -> Result<FacingSpread, LayoutError> {
    let night = state.night();
    let (left_index, right_index) = state.facing_pair();

    let left = renderer
        .render(source, left_index, ScalePolicy::Fit, viewport)
        .map(|page| with_night(page, night))
        .ok_or(LayoutError::LeftPageUnavailable { page: left_index })?;
    let right = (right_index < source.page_count())
        .then(|| renderer.render(source, right_index, ScalePolicy::Fit, viewport))
        .flatten()
        .map(|page| with_night(page, night));

    let right_size = right.as_ref().map_or((0, 0), RenderedPage::size);
    let width = left.bitmap.width + right_size.0;
    let height = left.bitmap.height.max(right_size.1);

    let mut combined = Bitmap::filled(width, height, SPREAD_BACKGROUND);
    combined.blit(&left.bitmap, 0, 0);
    if let Some(right) = &right {
        combined.blit(&right.bitmap, left.bitmap.width, 0);
    }

    let bitmap = combined
        .fit_within(viewport.width, viewport.height)
        .unwrap_or(combined);

    Ok(FacingSpread {
        bitmap,
        left: left_index,
        right: right.map(|p| p.page),
    })
}

fn with_night(mut page: RenderedPage, night: Option<NightMode>) -> RenderedPage {
    if let Some(night) = night {
        page.bitmap = night.apply(&page.bitmap);
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentKind, PageSize};
    use crate::test_utils::SyntheticSource;
    use crate::view::Command;

    fn no_progress() -> impl FnMut(usize, usize) {
        |_, _| {}
    }

    #[test]
    fn continuous_stacks_pages_with_spacing() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 3, PageSize::new(100.0, 200.0));
        let mut renderer = PageRenderer::new();
        let strip = compose_continuous(
            &mut renderer,
            &source,
            None,
            Viewport::new(120, 300),
            &CancelToken::new(),
            &mut no_progress(),
        );

        assert!(strip.complete);
        assert_eq!(strip.pages.len(), 3);
        assert_eq!(strip.width, 100);
        assert_eq!(strip.offsets, vec![0, 210, 420]);
        assert_eq!(strip.height, 620);
        assert_eq!(strip.page_at(205), Some(0));
        assert_eq!(strip.page_at(210), Some(1));
        assert_eq!(strip.offset_of(2), Some(420));
    }

    #[test]
    fn continuous_cancel_keeps_finished_pages() {
        let source = SyntheticSource::new(DocumentKind::Pdf, 5, PageSize::new(50.0, 50.0));
        let mut renderer = PageRenderer::new();
        let cancel = CancelToken::new();
        let mut seen = Vec::new();
        let mut progress = |done: usize, total: usize| {
            seen.push((done, total));
            if done == 2 {
                cancel.cancel();
            }
        };

        let strip = compose_continuous(
            &mut renderer,
            &source,
            None,
            Viewport::new(70, 70),
            &cancel,
            &mut progress,
        );
        assert!(!strip.complete);
        assert_eq!(strip.pages.len(), 2);
        assert_eq!(strip.pages[1].page, 1);
        assert_eq!(seen[0], (0, 5));
    }

    #[test]
    fn continuous_skips_failing_pages() {
        let source =
            SyntheticSource::new(DocumentKind::Djvu, 3, PageSize::new(40.0, 40.0)).failing_page(1);
        let mut renderer = PageRenderer::new();
        let strip = compose_continuous(
            &mut renderer,
            &source,
            None,
            Viewport::new(60, 60),
            &CancelToken::new(),
            &mut no_progress(),
        );
        let pages: Vec<_> = strip.pages.iter().map(|p| p.page).collect();
        assert_eq!(pages, vec![0, 2]);
        assert_eq!(strip.offset_of(1), None);
    }

    #[test]
    fn flatten_centres_narrow_pages() {
        let mut strip = PageStrip::default();
        strip.push(RenderedPage {
            page: 0,
            bitmap: Bitmap::filled(10, 4, [200, 0, 0]),
            scale: 1.0,
        });
        strip.push(RenderedPage {
            page: 1,
            bitmap: Bitmap::filled(6, 4, [0, 200, 0]),
            scale: 1.0,
        });

        let flat = strip.flatten().unwrap();
        assert_eq!(flat.size(), (10, 18));
        assert_eq!(flat.pixel(0, 16), Some(STRIP_BACKGROUND));
        assert_eq!(flat.pixel(2, 16), Some([0, 200, 0]));
        assert_eq!(flat.pixel(5, 6), Some(STRIP_BACKGROUND));
    }

    #[test]
    fn facing_places_right_page_after_left() {
        let source = SyntheticSource::with_sizes(
            DocumentKind::Djvu,
            vec![PageSize::new(100.0, 200.0), PageSize::new(100.0, 100.0)],
        );
        let mut renderer = PageRenderer::new();
        let mut state = ViewState::new(2);
        let _ = state.apply(Command::SetFacing(true));

        let spread = compose_facing(&mut renderer, &source, &state, Viewport::new(400, 200)).unwrap();
        assert_eq!((spread.left, spread.right), (0, Some(1)));
        // 100x200 + 200x200 side by side already fits the viewport.
        assert_eq!(spread.bitmap.size(), (300, 200));

        let left = renderer
            .render(&source, 0, ScalePolicy::Fit, Viewport::new(400, 200))
            .unwrap();
        assert_eq!(spread.bitmap.pixel(0, 0), left.bitmap.pixel(0, 0));
    }

    #[test]
    fn facing_pads_shorter_page_with_black() {
        let source = SyntheticSource::with_sizes(
            DocumentKind::Djvu,
            vec![PageSize::new(100.0, 100.0), PageSize::new(100.0, 50.0)],
        );
        let mut renderer = PageRenderer::new();
        let state = ViewState::new(2);

        let spread = compose_facing(&mut renderer, &source, &state, Viewport::new(100, 100)).unwrap();
        // Left 100x100, right 100x50: combined 200x100, fitted to 100x50.
        assert_eq!(spread.bitmap.size(), (100, 50));
        assert_eq!(spread.bitmap.pixel(99, 49), Some(SPREAD_BACKGROUND));
    }

    #[test]
    fn facing_last_odd_page_renders_alone() {
        let source = SyntheticSource::new(DocumentKind::Pdf, 3, PageSize::new(100.0, 100.0));
        let mut renderer = PageRenderer::new();
        let mut state = ViewState::new(3);
        state.current_page = 2;

        let spread = compose_facing(&mut renderer, &source, &state, Viewport::new(100, 100)).unwrap();
        assert_eq!((spread.left, spread.right), (2, None));
        assert_eq!(spread.bitmap.size(), (100, 100));
    }

    #[test]
    fn facing_reports_missing_left_page() {
        let source =
            SyntheticSource::new(DocumentKind::Djvu, 4, PageSize::new(10.0, 10.0)).failing_page(2);
        let mut renderer = PageRenderer::new();
        let mut state = ViewState::new(4);
        state.current_page = 3;

        let err = compose_facing(&mut renderer, &source, &state, Viewport::new(50, 50)).unwrap_err();
        assert!(matches!(err, LayoutError::LeftPageUnavailable { page: 2 }));
        assert_eq!(err.to_string(), LEFT_PAGE_FAILED);
    }

    #[test]
    fn night_mode_is_applied_per_page() {
        let source = SyntheticSource::new(DocumentKind::Djvu, 2, PageSize::new(30.0, 30.0));
        let mut renderer = PageRenderer::new();
        let mut state = ViewState::new(2);
        let _ = state.apply(Command::SetNightMode(true));

        let viewport = Viewport::new(30, 30);
        let surface = compose(
            &mut renderer,
            &source,
            &state,
            viewport,
            &CancelToken::new(),
            &mut no_progress(),
        )
        .unwrap();
        let original = renderer.render(&source, 0, ScalePolicy::Fit, viewport).unwrap();
        let expected = NightMode::new(state.warmth).apply(&original.bitmap);
        assert_eq!(surface.to_bitmap(), Some(expected));
    }

    #[test]
    fn single_mode_failure_is_empty_surface() {
        let source =
            SyntheticSource::new(DocumentKind::Djvu, 1, PageSize::new(30.0, 30.0)).failing_page(0);
        let mut renderer = PageRenderer::new();
        let surface = compose(
            &mut renderer,
            &source,
            &ViewState::new(1),
            Viewport::new(30, 30),
            &CancelToken::new(),
            &mut no_progress(),
        )
        .unwrap();
        assert!(surface.is_empty());
        assert_eq!(surface.size(), (0, 0));
    }
}
