//! Reading session
//!
//! [`Session`] owns the one open document and everything derived from it:
//! view state, render cache, thumbnails, the composed surface and the
//! scroll position. It also holds the preference store and reading history,
//! loaded once at startup and written on close and shutdown.
//!
//! Every user action is a method here. Actions go through
//! [`ViewState::apply`] and the returned [`Effect`]s are carried out in
//! order. Failures never escape as errors; they become notices collected in
//! a [`NotificationManager`] for the UI to show.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Timelike;
use log::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::document::{DocumentKind, DocumentSource, PageSize, open_document};
use crate::export::{self, EXPORT_DONE, ExportError, ExportSummary, NOT_DJVU, NO_FILE_OPEN};
use crate::history::ReadingHistory;
use crate::layout::{Surface, compose};
use crate::notification::{Notification, NotificationManager};
use crate::render::{PageRenderer, Viewport};
use crate::settings::SettingsStore;
use crate::thumbnails::{ThumbnailMessage, ThumbnailStrip, ThumbnailWorker, generate_blocking};
use crate::view::{Command, Effect, FocalPoint, LayoutMode, ScrollOffset, ViewState};

pub const DJVU_OPEN_FAILED: &str = "Failed to open DjVu file or no pages found.";
pub const PDF_OPEN_FAILED: &str = "Unable to open PDF or it's encrypted.";
pub const UNSUPPORTED_FILE: &str = "Only .djvu and .pdf files can be opened.";
pub const RECENT_FILE_MISSING: &str = "This file no longer exists.";
pub const TEXT_NOT_FOUND: &str = "Text not found.";
pub const EXPORT_CANCELLED: &str = "Export cancelled.";

/// Direction of a text search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// Summary shown by the "File Info" action
#[derive(Clone, Debug, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub page_count: usize,
    pub first_page: Option<PageSize>,
    pub resolution: Option<u32>,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File: {}", self.path.display())?;
        writeln!(f, "Type: {}", self.kind)?;
        write!(f, "Pages: {}", self.page_count)?;
        if let Some(size) = self.first_page {
            write!(f, "\nPage size: {:.0} x {:.0}", size.width, size.height)?;
        }
        if let Some(dpi) = self.resolution {
            write!(f, "\nResolution: {dpi} dpi")?;
        }
        Ok(())
    }
}

pub struct Session {
    document: Option<Box<dyn DocumentSource>>,
    state: ViewState,
    renderer: PageRenderer,
    thumbnails: ThumbnailStrip,
    thumbnail_worker: Option<ThumbnailWorker>,
    surface: Surface,
    scroll: ScrollOffset,
    viewport: Viewport,
    settings: SettingsStore,
    history: ReadingHistory,
    notifications: NotificationManager,
    cancel: CancelToken,
}

impl Session {
    /// A session with no document open. Night mode and warmth come from
    /// the stored preferences.
    #[must_use]
    pub fn new(settings: SettingsStore, history: ReadingHistory, viewport: Viewport) -> Self {
        let state = ViewState {
            night_mode: settings.get().night_mode,
            warmth: settings.get().warmth_level,
            ..ViewState::default()
        };
        Self {
            document: None,
            state,
            renderer: PageRenderer::new(),
            thumbnails: ThumbnailStrip::default(),
            thumbnail_worker: None,
            surface: Surface::Empty,
            scroll: ScrollOffset::default(),
            viewport,
            settings,
            history,
            notifications: NotificationManager::new(),
            cancel: CancelToken::new(),
        }
    }

    /// [`Session::new`] followed by the auto night mode check against the
    /// local clock.
    #[must_use]
    pub fn start(settings: SettingsStore, history: ReadingHistory, viewport: Viewport) -> Self {
        let mut session = Self::new(settings, history, viewport);
        session.apply_auto_night_mode(chrono::Local::now().hour());
        session
    }

    // Document lifecycle

    /// Open `path`, replacing the current document. On failure a notice is
    /// posted and the current document stays open.
    pub fn open(&mut self, path: &Path) -> bool {
        let Some(kind) = DocumentKind::from_path(path) else {
            self.notifications.warn(UNSUPPORTED_FILE);
            return false;
        };

        match open_document(path) {
            Ok(source) => self.open_source(source),
            Err(e) => {
                warn!("Failed to open {path:?}: {e}");
                self.notifications.warn(open_failure_message(kind));
                false
            }
        }
    }

    /// Take ownership of an already opened source.
    pub fn open_source(&mut self, source: Box<dyn DocumentSource>) -> bool {
        let page_count = source.page_count();
        if page_count == 0 {
            warn!("{:?} has no pages", source.path());
            self.notifications.warn(open_failure_message(source.kind()));
            return false;
        }

        self.close();

        let key = path_key(source.path());
        info!("Opened {} document {key} with {page_count} pages", source.kind());

        let mut state = ViewState {
            page_count,
            night_mode: self.state.night_mode,
            warmth: self.state.warmth,
            ..ViewState::default()
        };
        if let Some(last) = self.history.get(&key) {
            debug!("Restoring last read position for {key}: page {}", last.page);
            last.restore_into(&mut state);
        }
        self.state = state;
        self.settings.update(|s| s.push_recent(&key));
        self.thumbnails = ThumbnailStrip::new(page_count, self.state.night());
        self.document = Some(source);

        if self.settings.get().show_thumbnails {
            self.start_thumbnails();
        }
        self.render();
        self.anchor_scroll();
        true
    }

    /// Open a file from the recent list. A file that has gone away is
    /// dropped from the list.
    pub fn open_recent(&mut self, path: &str) -> bool {
        if !Path::new(path).exists() {
            self.notifications.warn(RECENT_FILE_MISSING);
            self.settings.update(|s| s.remove_recent(path));
            return false;
        }
        self.open(Path::new(path))
    }

    /// Open a dropped file. Anything that is not `.djvu` or `.pdf` is
    /// ignored without a notice.
    pub fn accept_drop(&mut self, path: &Path) -> bool {
        if DocumentKind::from_path(path).is_none() {
            debug!("Ignoring dropped file {path:?}");
            return false;
        }
        self.open(path)
    }

    /// Record the reading position and release the document.
    pub fn close(&mut self) {
        self.abandon_thumbnails();
        let Some(document) = self.document.take() else {
            return;
        };

        let key = path_key(document.path());
        self.history.record(&key, &self.state);
        if let Err(e) = self.history.save() {
            error!("Failed to save reading history: {e}");
        }
        info!("Closed {key} at page {}", self.state.current_page);

        self.thumbnails = ThumbnailStrip::default();
        self.renderer.clear();
        self.surface = Surface::Empty;
        self.scroll = ScrollOffset::default();
        self.state = ViewState {
            night_mode: self.state.night_mode,
            warmth: self.state.warmth,
            ..ViewState::default()
        };
    }

    /// Close the document and write preferences and history.
    pub fn shutdown(mut self) {
        self.close();
        self.settings.save_or_log();
        if let Err(e) = self.history.save() {
            error!("Failed to save reading history: {e}");
        }
    }

    // View

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        if self.document.is_some() {
            self.render();
            self.scroll = self.scroll.clamped(self.viewport, self.surface.size());
        }
    }

    /// Scroll to `offset`. In continuous mode the page under the top edge
    /// becomes the current page.
    pub fn scroll_to(&mut self, offset: ScrollOffset) {
        self.scroll = offset.clamped(self.viewport, self.surface.size());
        if let Surface::Continuous(strip) = &self.surface {
            if let Some(page) = strip.page_at(self.scroll.y) {
                self.state.current_page = page;
            }
        }
    }

    pub fn next_page(&mut self) {
        self.apply(Command::NextPage);
    }

    pub fn prev_page(&mut self) {
        self.apply(Command::PrevPage);
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.apply(Command::GoToPage(page));
    }

    pub fn zoom_in(&mut self) {
        self.apply(Command::ZoomIn);
    }

    pub fn zoom_out(&mut self) {
        self.apply(Command::ZoomOut);
    }

    pub fn fit_to_window(&mut self, enabled: bool) {
        self.apply(Command::SetFitToWindow(enabled));
    }

    pub fn set_night_mode(&mut self, enabled: bool) {
        self.apply(Command::SetNightMode(enabled));
    }

    pub fn toggle_night_mode(&mut self) {
        self.set_night_mode(!self.state.night_mode);
    }

    pub fn set_warmth(&mut self, warmth: u8) {
        self.apply(Command::SetWarmth(warmth));
    }

    pub fn set_auto_night_mode(&mut self, enabled: bool) {
        self.settings.update(|s| s.auto_night_mode = enabled);
    }

    /// Turn night mode on when auto night mode is enabled and `hour` is in
    /// the evening. The stored night mode preference is left alone.
    pub fn apply_auto_night_mode(&mut self, hour: u32) {
        if self.state.night_mode || !self.settings.get().night_mode_at(hour) {
            return;
        }
        info!("Auto night mode at hour {hour}");
        let mut effects = self.state.apply(Command::SetNightMode(true));
        effects.retain(|e| *e != Effect::SavePreferences);
        self.handle_effects(effects, false);
    }

    pub fn set_continuous(&mut self, enabled: bool) {
        self.apply(Command::SetContinuous(enabled));
    }

    pub fn set_facing(&mut self, enabled: bool) {
        self.apply(Command::SetFacing(enabled));
    }

    // Thumbnails

    pub fn set_show_thumbnails(&mut self, enabled: bool) {
        if self.settings.get().show_thumbnails == enabled {
            return;
        }
        self.settings.update(|s| s.show_thumbnails = enabled);

        if enabled {
            self.thumbnails = ThumbnailStrip::new(self.state.page_count, self.state.night());
            self.start_thumbnails();
        } else {
            self.abandon_thumbnails();
            self.thumbnails.clear();
        }
    }

    /// Move every thumbnail the worker has finished into the strip.
    /// Returns how many arrived.
    pub fn poll_thumbnails(&mut self) -> usize {
        let Some(worker) = self.thumbnail_worker.as_mut() else {
            return 0;
        };
        let messages = worker.poll();
        let finished = worker.is_finished();

        let mut arrived = 0;
        for message in messages {
            arrived += usize::from(self.accept_thumbnail(message));
        }
        if finished {
            self.thumbnail_worker = None;
        }
        arrived
    }

    /// Block until the worker is done or `timeout` passes. Returns true when
    /// no thumbnails are still pending.
    pub fn wait_for_thumbnails(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while let Some(worker) = self.thumbnail_worker.as_mut() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let message = worker.recv_timeout(remaining);
            let finished = worker.is_finished();
            if let Some(message) = message {
                self.accept_thumbnail(message);
            }
            if finished {
                self.thumbnail_worker = None;
            }
        }
        true
    }

    #[must_use]
    pub fn thumbnails_pending(&self) -> bool {
        self.thumbnail_worker.is_some()
    }

    // Rendering

    /// Rebuild the surface. `progress` gets `(done, total)` once per page
    /// of a continuous render; cancelling [`Self::render_cancel_token`]
    /// from inside it stops the render after the current page.
    pub fn rerender_with_progress(&mut self, progress: &mut dyn FnMut(usize, usize)) {
        let Some(document) = self.document.as_deref() else {
            self.surface = Surface::Empty;
            return;
        };
        if self.viewport.is_empty() {
            debug!("Skipping render into an empty viewport");
            return;
        }

        self.cancel.reset();
        let started = Instant::now();
        match compose(
            &mut self.renderer,
            document,
            &self.state,
            self.viewport,
            &self.cancel,
            progress,
        ) {
            Ok(surface) => {
                debug!(
                    "Composed {:?} surface {:?} in {:?}",
                    self.state.layout,
                    surface.size(),
                    started.elapsed()
                );
                self.surface = surface;
            }
            Err(e) => {
                warn!("Render failed: {e}");
                self.notifications.warn(e.to_string());
            }
        }
    }

    /// Handle for cancelling a running continuous render or export.
    #[must_use]
    pub fn render_cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // Tools

    /// Find `query` (case-insensitive) in the page text, starting after the
    /// current page and wrapping around. Moves to the hit page.
    pub fn search(&mut self, query: &str, direction: SearchDirection) -> Option<usize> {
        let query = query.trim().to_lowercase();
        let document = self.document.as_deref()?;
        if query.is_empty() {
            return None;
        }

        let count = document.page_count();
        let current = self.state.current_page;
        let order: Vec<usize> = match direction {
            SearchDirection::Forward => (1..=count).map(|i| (current + i) % count).collect(),
            SearchDirection::Backward => (1..=count).map(|i| (current + count - i) % count).collect(),
        };

        let hit = order.into_iter().find(|&page| match document.page_text(page) {
            Ok(text) => text.to_lowercase().contains(&query),
            Err(e) => {
                debug!("No text for page {page}: {e}");
                false
            }
        });

        match hit {
            Some(page) => {
                info!("Found {query:?} on page {page}");
                self.go_to_page(page);
            }
            None => self.notifications.info(TEXT_NOT_FOUND),
        }
        hit
    }

    pub fn file_info(&mut self) -> Option<FileInfo> {
        let Some(document) = self.document.as_deref() else {
            self.notifications.warn(NO_FILE_OPEN);
            return None;
        };
        Some(FileInfo {
            path: document.path().to_path_buf(),
            kind: document.kind(),
            page_count: document.page_count(),
            first_page: document.page_size(0).ok(),
            resolution: document.resolution(0),
        })
    }

    /// Export the open DjVu document to PDF. `output` defaults to the
    /// document path with a `.pdf` extension.
    pub fn export_pdf(
        &mut self,
        output: Option<&Path>,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Option<ExportSummary> {
        let Some(document) = self.document.as_deref() else {
            self.notifications.warn(NO_FILE_OPEN);
            return None;
        };
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| export::default_export_path(document.path()));

        self.cancel.reset();
        match export::export_pdf(document, &output, &self.cancel, progress) {
            Ok(summary) => {
                self.notifications.info(EXPORT_DONE);
                Some(summary)
            }
            Err(ExportError::NotDjvu) => {
                self.notifications.warn(NOT_DJVU);
                None
            }
            Err(ExportError::Cancelled) => {
                self.notifications.info(EXPORT_CANCELLED);
                None
            }
            Err(e) => {
                error!("Export to {output:?} failed: {e}");
                self.notifications.error(format!("Export failed: {e}"));
                None
            }
        }
    }

    /// Take every pending notice.
    pub fn take_notices(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }

    // Accessors

    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn document(&self) -> Option<&dyn DocumentSource> {
        self.document.as_deref()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[must_use]
    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn thumbnails(&self) -> &ThumbnailStrip {
        &self.thumbnails
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    #[must_use]
    pub fn history(&self) -> &ReadingHistory {
        &self.history
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    // Internals

    fn apply(&mut self, command: Command) {
        let page_before = self.state.current_page;
        let layout_before = self.state.layout;
        let effects = self.state.apply(command);
        let moved =
            self.state.current_page != page_before || self.state.layout != layout_before;
        self.handle_effects(effects, moved);
    }

    fn handle_effects(&mut self, effects: Vec<Effect>, moved: bool) {
        let mut render = false;
        let mut recenter = false;

        for effect in effects {
            match effect {
                Effect::Render => render = true,
                Effect::RecenterScroll => recenter = true,
                Effect::RefreshThumbnails => self.thumbnails.set_night(self.state.night()),
                Effect::SavePreferences => {
                    let (night_mode, warmth) = (self.state.night_mode, self.state.warmth);
                    self.settings.update(|s| {
                        s.night_mode = night_mode;
                        s.warmth_level = warmth;
                    });
                }
                Effect::Notify(notification) => self.notifications.show(notification),
            }
        }

        if !render || self.document.is_none() {
            return;
        }

        // Paging inside a finished strip only scrolls.
        let strip_done = matches!(&self.surface, Surface::Continuous(strip) if strip.complete);
        if moved && strip_done && self.state.layout == LayoutMode::Continuous {
            self.anchor_scroll();
            return;
        }

        let focal = FocalPoint::capture(self.scroll, self.viewport, self.surface.size());
        self.render();
        if recenter {
            self.scroll = focal.offset_for(self.viewport, self.surface.size());
        } else if moved {
            self.anchor_scroll();
        } else {
            self.scroll = self.scroll.clamped(self.viewport, self.surface.size());
        }
    }

    fn render(&mut self) {
        self.rerender_with_progress(&mut |_, _| {});
    }

    /// Scroll to the top of the current page.
    fn anchor_scroll(&mut self) {
        let y = match &self.surface {
            Surface::Continuous(strip) => strip.offset_of(self.state.current_page).unwrap_or(0),
            _ => 0,
        };
        self.scroll = ScrollOffset::new(0, y).clamped(self.viewport, self.surface.size());
    }

    fn start_thumbnails(&mut self) {
        self.abandon_thumbnails();
        let Some(document) = self.document.as_deref() else {
            return;
        };

        match document.kind() {
            DocumentKind::Djvu => {
                let started = Instant::now();
                generate_blocking(document, &mut self.thumbnails, &CancelToken::new());
                debug!(
                    "Generated {} DjVu thumbnails in {:?}",
                    self.thumbnails.filled(),
                    started.elapsed()
                );
            }
            DocumentKind::Pdf => {
                self.thumbnail_worker =
                    Some(ThumbnailWorker::spawn(document.reopen(), document.page_count()));
            }
        }
    }

    fn abandon_thumbnails(&mut self) {
        if let Some(worker) = self.thumbnail_worker.take() {
            worker.abandon();
        }
    }

    fn accept_thumbnail(&mut self, message: ThumbnailMessage) -> bool {
        match message {
            ThumbnailMessage::Ready { page, bitmap } => {
                self.thumbnails.insert(page, bitmap);
                return true;
            }
            ThumbnailMessage::Failed { page, error } => {
                warn!("Thumbnail for page {page} failed: {error}");
            }
            ThumbnailMessage::OpenFailed(error) => {
                warn!("Thumbnail worker could not open the document: {error}");
            }
            ThumbnailMessage::Finished => debug!("All thumbnails delivered"),
        }
        false
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abandon_thumbnails();
    }
}

fn open_failure_message(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Djvu => DJVU_OPEN_FAILED,
        DocumentKind::Pdf => PDF_OPEN_FAILED,
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
