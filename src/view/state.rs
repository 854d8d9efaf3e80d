//! View state management
//!
//! The session's mutable view settings and the rules tying them together.
//! Every change goes through [`ViewState::apply`], which reports what the
//! caller has to redo as a list of [`Effect`]s.

use serde::{Deserialize, Serialize};

use super::zoom::{ZOOM_STEP, clamp_zoom};
use crate::notification::Notification;
use crate::render::night::{DEFAULT_WARMTH, MAX_WARMTH};
use crate::render::{NightMode, ScalePolicy};

pub const DISABLE_CONTINUOUS_FIRST: &str = "Disable Continuous Scroll Mode first.";
pub const DISABLE_FACING_FIRST: &str = "Disable Facing Pages Mode first.";

/// How pages are arranged on the display surface
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Single,
    Continuous,
    Facing,
}

/// Current view settings for the open document
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    /// Current page (0-indexed)
    pub current_page: usize,
    pub page_count: usize,
    /// Zoom factor on top of the fitted size
    pub zoom: f32,
    pub fit_to_window: bool,
    pub night_mode: bool,
    /// Hue rotation in degrees, 0..=100
    pub warmth: u8,
    pub layout: LayoutMode,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current_page: 0,
            page_count: 0,
            zoom: 1.0,
            fit_to_window: true,
            night_mode: false,
            warmth: DEFAULT_WARMTH,
            layout: LayoutMode::Single,
        }
    }
}

impl ViewState {
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            ..Self::default()
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::GoToPage(page) => {
                let clamped = page.min(self.page_count.saturating_sub(1));
                self.move_to(clamped)
            }

            Command::NextPage => {
                let step = self.step();
                if self.current_page + step < self.page_count {
                    self.move_to(self.current_page + step)
                } else {
                    vec![]
                }
            }

            Command::PrevPage => match self.current_page.checked_sub(self.step()) {
                Some(page) => self.move_to(page),
                None => vec![],
            },

            Command::ZoomIn => self.set_zoom(self.zoom * ZOOM_STEP),

            Command::ZoomOut => self.set_zoom(self.zoom / ZOOM_STEP),

            Command::SetFitToWindow(enabled) => {
                if enabled {
                    let changed = !self.fit_to_window || self.zoom != 1.0;
                    self.fit_to_window = true;
                    self.zoom = 1.0;
                    if changed { vec![Effect::Render] } else { vec![] }
                } else if self.fit_to_window {
                    self.fit_to_window = false;
                    vec![Effect::Render]
                } else {
                    vec![]
                }
            }

            Command::SetNightMode(enabled) => {
                if self.night_mode == enabled {
                    return vec![];
                }
                self.night_mode = enabled;
                vec![
                    Effect::Render,
                    Effect::RefreshThumbnails,
                    Effect::SavePreferences,
                ]
            }

            Command::SetWarmth(level) => {
                let level = level.min(MAX_WARMTH);
                if self.warmth == level {
                    return vec![];
                }
                self.warmth = level;
                if self.night_mode {
                    vec![
                        Effect::Render,
                        Effect::RefreshThumbnails,
                        Effect::SavePreferences,
                    ]
                } else {
                    vec![Effect::SavePreferences]
                }
            }

            Command::SetContinuous(enabled) => {
                self.set_layout(LayoutMode::Continuous, enabled, DISABLE_FACING_FIRST)
            }

            Command::SetFacing(enabled) => {
                self.set_layout(LayoutMode::Facing, enabled, DISABLE_CONTINUOUS_FIRST)
            }
        }
    }

    /// Navigation step: a whole spread in facing mode.
    #[must_use]
    pub fn step(&self) -> usize {
        if self.layout == LayoutMode::Facing {
            2
        } else {
            1
        }
    }

    /// Left and right page of the spread containing the current page.
    /// The right page may lie past the end of the document.
    #[must_use]
    pub fn facing_pair(&self) -> (usize, usize) {
        let left = self.current_page - self.current_page % 2;
        (left, left + 1)
    }

    #[must_use]
    pub fn night(&self) -> Option<NightMode> {
        self.night_mode.then(|| NightMode::new(self.warmth))
    }

    /// Scale policy for single-page rendering.
    #[must_use]
    pub fn scale_policy(&self) -> ScalePolicy {
        if self.fit_to_window {
            ScalePolicy::Fit
        } else {
            ScalePolicy::Zoom(self.zoom)
        }
    }

    fn move_to(&mut self, page: usize) -> Vec<Effect> {
        if self.current_page == page || page >= self.page_count {
            return vec![];
        }
        self.current_page = page;
        vec![Effect::Render]
    }

    fn set_zoom(&mut self, zoom: f32) -> Vec<Effect> {
        self.fit_to_window = false;
        self.zoom = clamp_zoom(zoom);
        vec![Effect::Render, Effect::RecenterScroll]
    }

    fn set_layout(&mut self, mode: LayoutMode, enabled: bool, conflict: &str) -> Vec<Effect> {
        if !enabled {
            if self.layout != mode {
                return vec![];
            }
            self.layout = LayoutMode::Single;
            return vec![Effect::Render];
        }

        match self.layout {
            current if current == mode => vec![],
            LayoutMode::Single => {
                self.layout = mode;
                vec![Effect::Render]
            }
            _ => vec![Effect::Notify(Notification::info(conflict))],
        }
    }
}

/// Commands that modify view state
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    GoToPage(usize),
    NextPage,
    PrevPage,
    ZoomIn,
    ZoomOut,
    SetFitToWindow(bool),
    SetNightMode(bool),
    SetWarmth(u8),
    SetContinuous(bool),
    SetFacing(bool),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Rebuild the display surface
    Render,
    /// Restore the focal point after a zoom step
    RecenterScroll,
    /// Re-derive every display thumbnail from its original
    RefreshThumbnails,
    /// Night-mode preferences changed
    SavePreferences,
    /// Tell the user something; state is unchanged
    Notify(Notification),
}
