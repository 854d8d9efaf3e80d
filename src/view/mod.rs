//! Session view state: page, zoom, night mode and layout

mod state;
mod zoom;

pub use state::{
    Command, DISABLE_CONTINUOUS_FIRST, DISABLE_FACING_FIRST, Effect, LayoutMode, ViewState,
};
pub use zoom::{FocalPoint, MAX_ZOOM, MIN_ZOOM, ScrollOffset, ZOOM_STEP, clamp_zoom};
