//! Zoom factor limits and focal-point preserving scroll
//!
//! Before a zoom step the position of the viewport centre is captured as a
//! fraction of the content size; after the re-render the scroll offset is
//! chosen so that the same fraction is centred again. Both axes are
//! independent.

use crate::render::Viewport;

/// Multiplier per zoom-in step, divisor per zoom-out step.
pub const ZOOM_STEP: f32 = 1.1;
/// Minimum allowed zoom factor
pub const MIN_ZOOM: f32 = 0.1;
/// Maximum allowed zoom factor
pub const MAX_ZOOM: f32 = 10.0;

/// Clamp factor to valid range, handling NaN/Inf
#[must_use]
pub fn clamp_zoom(factor: f32) -> f32 {
    if factor.is_finite() {
        factor.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

/// Scroll position of the viewport's top-left corner within the content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollOffset {
    pub x: u32,
    pub y: u32,
}

impl ScrollOffset {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Clamp into the scrollable range `[0, content - viewport]` per axis.
    #[must_use]
    pub fn clamped(self, viewport: Viewport, content: (u32, u32)) -> Self {
        Self {
            x: self.x.min(content.0.saturating_sub(viewport.width)),
            y: self.y.min(content.1.saturating_sub(viewport.height)),
        }
    }
}

/// Viewport centre as a fraction of the content size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FocalPoint {
    pub ratio_x: f64,
    pub ratio_y: f64,
}

impl Default for FocalPoint {
    fn default() -> Self {
        Self::CENTER
    }
}

impl FocalPoint {
    pub const CENTER: Self = Self {
        ratio_x: 0.5,
        ratio_y: 0.5,
    };

    /// `ratio = (scroll + viewport / 2) / content`, per axis. An empty
    /// content axis yields the centre.
    #[must_use]
    pub fn capture(scroll: ScrollOffset, viewport: Viewport, content: (u32, u32)) -> Self {
        Self {
            ratio_x: axis_ratio(scroll.x, viewport.width, content.0),
            ratio_y: axis_ratio(scroll.y, viewport.height, content.1),
        }
    }

    /// Scroll offset that centres this focal point in content of the given
    /// size: `offset = content * ratio - viewport / 2`, clamped.
    #[must_use]
    pub fn offset_for(self, viewport: Viewport, content: (u32, u32)) -> ScrollOffset {
        ScrollOffset {
            x: axis_offset(self.ratio_x, viewport.width, content.0),
            y: axis_offset(self.ratio_y, viewport.height, content.1),
        }
        .clamped(viewport, content)
    }
}

fn axis_ratio(scroll: u32, viewport: u32, content: u32) -> f64 {
    if content == 0 {
        return 0.5;
    }
    (f64::from(scroll) + f64::from(viewport) / 2.0) / f64::from(content)
}

fn axis_offset(ratio: f64, viewport: u32, content: u32) -> u32 {
    let offset = f64::from(content) * ratio - f64::from(viewport) / 2.0;
    offset.round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_garbage() {
        assert_eq!(clamp_zoom(f32::NAN), 1.0);
        assert_eq!(clamp_zoom(0.0), MIN_ZOOM);
        assert_eq!(clamp_zoom(1e9), MAX_ZOOM);
        assert_eq!(clamp_zoom(1.5), 1.5);
    }

    #[test]
    fn capture_uses_viewport_centre() {
        let focal = FocalPoint::capture(
            ScrollOffset::new(100, 0),
            Viewport::new(200, 100),
            (1000, 400),
        );
        assert!((focal.ratio_x - 0.2).abs() < 1e-9);
        assert!((focal.ratio_y - 0.125).abs() < 1e-9);
    }

    #[test]
    fn focal_point_survives_rescale() {
        let viewport = Viewport::new(400, 300);
        let before = (1000, 1400);
        let scroll = ScrollOffset::new(250, 600);
        let focal = FocalPoint::capture(scroll, viewport, before);

        let after = (1100, 1540);
        let restored = focal.offset_for(viewport, after);
        let again = FocalPoint::capture(restored, viewport, after);
        assert!((again.ratio_x - focal.ratio_x).abs() < 1.0 / 1100.0);
        assert!((again.ratio_y - focal.ratio_y).abs() < 1.0 / 1540.0);
    }

    #[test]
    fn offsets_are_clamped_to_content() {
        let viewport = Viewport::new(400, 300);
        let focal = FocalPoint {
            ratio_x: 0.99,
            ratio_y: 0.0,
        };
        assert_eq!(focal.offset_for(viewport, (1000, 1000)), ScrollOffset::new(600, 0));
        assert_eq!(focal.offset_for(viewport, (200, 100)), ScrollOffset::new(0, 0));
    }

    #[test]
    fn empty_content_is_centred() {
        let focal = FocalPoint::capture(ScrollOffset::default(), Viewport::new(10, 10), (0, 0));
        assert_eq!(focal, FocalPoint::CENTER);
    }
}
