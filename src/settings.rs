use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::render::night::{DEFAULT_WARMTH, MAX_WARMTH};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
pub const APP_NAME: &str = "bookreader";

/// Most-recently-used list length.
pub const MAX_RECENT_FILES: usize = 5;

/// Local hour from which auto night mode switches night mode on.
pub const AUTO_NIGHT_HOUR: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub night_mode: bool,

    #[serde(default = "default_warmth")]
    pub warmth_level: u8,

    #[serde(default = "default_true")]
    pub auto_night_mode: bool,

    #[serde(default = "default_true")]
    pub show_thumbnails: bool,

    /// Most recent first
    #[serde(default)]
    pub recent_files: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_warmth() -> u8 {
    DEFAULT_WARMTH
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            night_mode: false,
            warmth_level: DEFAULT_WARMTH,
            auto_night_mode: true,
            show_thumbnails: true,
            recent_files: Vec::new(),
        }
    }
}

impl Settings {
    /// Night mode at startup: the stored flag, or forced on in the evening
    /// when auto night mode is enabled.
    #[must_use]
    pub fn night_mode_at(&self, hour: u32) -> bool {
        self.night_mode || (self.auto_night_mode && hour >= AUTO_NIGHT_HOUR)
    }

    /// Move `path` to the front of the recent list, dropping duplicates and
    /// anything past the limit.
    pub fn push_recent(&mut self, path: &str) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_string());
        self.recent_files.truncate(MAX_RECENT_FILES);
    }

    pub fn remove_recent(&mut self, path: &str) {
        self.recent_files.retain(|p| p != path);
    }
}

/// Preferences loaded once at startup and saved at shutdown.
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: Settings,
    path: Option<PathBuf>,
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl SettingsStore {
    /// In-memory settings that are never written.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::default()
    }

    /// Load from the platform config directory, creating the file with
    /// defaults when it does not exist yet.
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = preferred_config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Self::ephemeral();
        };
        Self::load_from(&path)
    }

    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        let mut store = Self {
            settings: Settings::default(),
            path: Some(path.to_path_buf()),
        };

        if !path.exists() {
            info!("Settings file not found, creating with defaults at {path:?}");
            store.save_or_log();
            return store;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    debug!("Loaded settings from {path:?}");
                    if settings.version < CURRENT_VERSION {
                        migrate_settings(&mut settings);
                        store.settings = settings;
                        store.save_or_log();
                    } else {
                        sanitize(&mut settings);
                        store.settings = settings;
                    }
                }
                Err(e) => error!("Failed to parse settings file {path:?}: {e}"),
            },
            Err(e) => error!("Failed to read settings file {path:?}: {e}"),
        }
        store
    }

    #[must_use]
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Change settings in memory; nothing is written until [`save`](Self::save).
    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings);
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = String::from("# bookreader preferences\n");
        content.push_str(&serde_yaml::to_string(&self.settings)?);
        fs::write(path, content)?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    pub fn save_or_log(&self) {
        if let Err(e) = self.save() {
            error!("Failed to save settings: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    sanitize(settings);
    settings.version = CURRENT_VERSION;
}

fn sanitize(settings: &mut Settings) {
    settings.warmth_level = settings.warmth_level.min(MAX_WARMTH);
    let mut seen = Vec::with_capacity(settings.recent_files.len());
    settings.recent_files.retain(|p| {
        if seen.contains(p) {
            false
        } else {
            seen.push(p.clone());
            true
        }
    });
    settings.recent_files.truncate(MAX_RECENT_FILES);
}
