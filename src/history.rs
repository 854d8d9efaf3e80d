use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::APP_NAME;
use crate::view::{LayoutMode, ViewState};

const HISTORY_FILENAME: &str = "history.json";

/// Where the reader was in one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRead {
    pub page: usize,
    pub zoom: f32,
    pub fit_to_window: bool,
    pub night_mode: bool,
    pub facing_pages_mode: bool,
    pub continuous_scroll_mode: bool,
    pub last_read: chrono::DateTime<chrono::Utc>,
}

impl LastRead {
    #[must_use]
    pub fn capture(state: &ViewState) -> Self {
        Self {
            page: state.current_page,
            zoom: state.zoom,
            fit_to_window: state.fit_to_window,
            night_mode: state.night_mode,
            facing_pages_mode: state.layout == LayoutMode::Facing,
            continuous_scroll_mode: state.layout == LayoutMode::Continuous,
            last_read: chrono::Utc::now(),
        }
    }

    /// Put the saved position back into `state`. The page is clamped to
    /// the document; when both layout flags were saved, continuous wins.
    pub fn restore_into(&self, state: &mut ViewState) {
        state.current_page = self.page.min(state.page_count.saturating_sub(1));
        state.zoom = crate::view::clamp_zoom(self.zoom);
        state.fit_to_window = self.fit_to_window;
        state.night_mode = self.night_mode;
        state.layout = if self.continuous_scroll_mode {
            LayoutMode::Continuous
        } else if self.facing_pages_mode {
            LayoutMode::Facing
        } else {
            LayoutMode::Single
        };
    }
}

/// Per-document reading positions, keyed by file path
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingHistory {
    documents: HashMap<String, LastRead>,
    #[serde(default)]
    last_opened: Option<String>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

pub fn default_history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|data| data.join(APP_NAME).join(HISTORY_FILENAME))
}

impl ReadingHistory {
    pub fn ephemeral() -> Self {
        Self {
            documents: HashMap::new(),
            last_opened: None,
            file_path: None,
        }
    }

    pub fn with_file(file_path: &Path) -> Self {
        Self {
            file_path: Some(file_path.to_path_buf()),
            ..Self::ephemeral()
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load reading history from {path:?}: {e}");
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut history: Self = serde_json::from_str(&content)?;
            history.file_path = Some(file_path.to_path_buf());
            Ok(history)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn get(&self, path: &str) -> Option<&LastRead> {
        self.documents.get(path)
    }

    pub fn record(&mut self, path: &str, state: &ViewState) {
        self.documents
            .insert(path.to_string(), LastRead::capture(state));
        self.last_opened = Some(path.to_string());
    }

    pub fn forget(&mut self, path: &str) {
        self.documents.remove(path);
        if self.last_opened.as_deref() == Some(path) {
            self.last_opened = None;
        }
    }

    pub fn last_opened(&self) -> Option<&str> {
        self.last_opened.as_deref()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
