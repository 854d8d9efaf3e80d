use std::path::Path;

use bookreader::history::ReadingHistory;
use bookreader::session::RECENT_FILE_MISSING;
use bookreader::settings::SettingsStore;
use bookreader::test_utils::SyntheticSource;
use bookreader::{DocumentKind, LayoutMode, Notification, PageSize, Session, Viewport};
use tempfile::TempDir;

struct Profile {
    dir: TempDir,
}

impl Profile {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn session(&self) -> Session {
        let settings = SettingsStore::load_from(&self.dir.path().join("config.yaml"));
        let history_path = self.dir.path().join("history.json");
        let history = ReadingHistory::load_or_ephemeral(Some(&history_path));
        Session::new(settings, history, Viewport::new(500, 400))
    }

    fn book(&self, name: &str, pages: usize) -> Box<SyntheticSource> {
        Box::new(
            SyntheticSource::new(DocumentKind::Djvu, pages, PageSize::new(100.0, 140.0))
                .with_path(self.dir.path().join(name)),
        )
    }

    fn key(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }
}

#[test]
fn reading_position_survives_restart() {
    let profile = Profile::new();

    let mut session = profile.session();
    session.open_source(profile.book("novel.djvu", 30));
    session.set_facing(true);
    session.go_to_page(17);
    session.zoom_in();
    session.shutdown();

    let mut session = profile.session();
    assert_eq!(
        session.history().last_opened(),
        Some(profile.key("novel.djvu").as_str())
    );
    session.open_source(profile.book("novel.djvu", 30));

    let state = session.state();
    assert_eq!(state.current_page, 17);
    assert_eq!(state.layout, LayoutMode::Facing);
    assert!(!state.fit_to_window);
    assert!((state.zoom - 1.1).abs() < 1e-6);
}

#[test]
fn closing_writes_reading_position() {
    let profile = Profile::new();

    let mut session = profile.session();
    session.open_source(profile.book("atlas.djvu", 20));
    session.go_to_page(12);
    session.close();

    let history_path = profile.dir.path().join("history.json");
    let history = ReadingHistory::load_or_ephemeral(Some(&history_path));
    assert_eq!(history.get(&profile.key("atlas.djvu")).map(|l| l.page), Some(12));
    assert!(!session.is_open());
}

#[test]
fn preferences_survive_restart() {
    let profile = Profile::new();

    let mut session = profile.session();
    session.set_night_mode(true);
    session.set_warmth(45);
    session.set_auto_night_mode(false);
    session.shutdown();

    let session = profile.session();
    let settings = session.settings().get();
    assert!(settings.night_mode);
    assert_eq!(settings.warmth_level, 45);
    assert!(!settings.auto_night_mode);
    assert!(session.state().night_mode);
    assert_eq!(session.state().warmth, 45);
}

#[test]
fn recent_files_keep_five_newest_first() {
    let profile = Profile::new();
    let mut session = profile.session();

    for i in 0..7 {
        session.open_source(profile.book(&format!("book{i}.djvu"), 2));
    }
    session.open_source(profile.book("book3.djvu", 2));
    session.shutdown();

    let session = profile.session();
    let expected: Vec<String> = [3, 6, 5, 4, 2]
        .iter()
        .map(|i| profile.key(&format!("book{i}.djvu")))
        .collect();
    assert_eq!(session.settings().get().recent_files, expected);
}

#[test]
fn missing_recent_file_is_pruned() {
    let profile = Profile::new();
    let mut session = profile.session();
    session.open_source(profile.book("gone.djvu", 2));
    session.close();

    let key = profile.key("gone.djvu");
    assert!(!Path::new(&key).exists());
    assert!(!session.open_recent(&key));

    assert_eq!(
        session.take_notices(),
        vec![Notification::warning(RECENT_FILE_MISSING)]
    );
    assert!(session.settings().get().recent_files.is_empty());
}
