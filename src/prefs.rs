//! Small persisted client state: the theme choice and the logged-in session.
//!
//! `state.json` in the data directory is a flat JSON object, read once on
//! open and rewritten in full on every change.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::fields::Theme;
use crate::wire::write_json_atomic;

pub const THEME_KEY: &str = "taskflow-theme";
pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "token";

/// Key/value document kept next to the config file.
#[derive(Debug)]
pub struct LocalState {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl LocalState {
    /// Load `path`, starting empty if it is missing or unreadable.
    pub fn open(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(buf) => match serde_json::from_str::<Map<String, Value>>(&buf) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), "state file unreadable, starting fresh: {e}");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self { path: Some(path.to_path_buf()), values }
    }

    /// Never written to disk. Used by tests and one-off commands.
    pub fn in_memory() -> Self {
        Self { path: None, values: Map::new() }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store `value` under `key`. The in-memory value only changes once
    /// the file write succeeded.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let mut next = self.values.clone();
        next.insert(key.to_string(), serde_json::to_value(value)?);
        self.commit(next)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if !self.values.contains_key(key) {
            return Ok(());
        }
        let mut next = self.values.clone();
        next.remove(key);
        self.commit(next)
    }

    fn commit(&mut self, next: Map<String, Value>) -> Result<()> {
        if let Some(path) = &self.path {
            write_json_atomic(path, &next)?;
            debug!(path = %path.display(), "state saved");
        }
        self.values = next;
        Ok(())
    }
}

/// Guess from `COLORFGBG` ("fg;bg"). Backgrounds 0-6 and 8 are the dark
/// ANSI colours.
pub fn theme_from_colorfgbg(value: &str) -> Option<Theme> {
    let bg: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    Some(if bg <= 6 || bg == 8 { Theme::Dark } else { Theme::Light })
}

/// The light/dark choice, persisted under [`THEME_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePrefs {
    theme: Theme,
}

impl ThemePrefs {
    /// Stored value first, then the terminal's hint, then light.
    pub fn load(state: &LocalState) -> Self {
        let stored = state.get::<String>(THEME_KEY).and_then(|s| Theme::parse(&s));
        let hinted = || std::env::var("COLORFGBG").ok().and_then(|v| theme_from_colorfgbg(&v));
        Self { theme: stored.or_else(hinted).unwrap_or(Theme::Light) }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn is_dark(&self) -> bool {
        self.theme == Theme::Dark
    }

    pub fn set(&mut self, theme: Theme, state: &mut LocalState) -> Result<()> {
        state.set(THEME_KEY, &theme.as_str())?;
        self.theme = theme;
        Ok(())
    }

    pub fn toggle(&mut self, state: &mut LocalState) -> Result<Theme> {
        let next = self.theme.toggled();
        self.set(next, state)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = LocalState::open(&path);
        state.set(TOKEN_KEY, &"abc").unwrap();
        assert!(!dir.path().join("state.json.tmp").exists());

        let reopened = LocalState::open(&path);
        assert_eq!(reopened.get::<String>(TOKEN_KEY).as_deref(), Some("abc"));
    }

    #[test]
    fn test_corrupt_state_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let state = LocalState::open(&path);
        assert!(!state.contains(THEME_KEY));
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = LocalState::open(&path);
        state.set(THEME_KEY, &"light").unwrap();
        fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(state.set(THEME_KEY, &"dark").is_err());
        assert_eq!(state.get::<String>(THEME_KEY).as_deref(), Some("light"));
        assert!(state.remove(THEME_KEY).is_err());
        assert!(state.contains(THEME_KEY));
    }

    #[test]
    fn test_remove_key() {
        let mut state = LocalState::in_memory();
        state.set(USER_KEY, &serde_json::json!({"id": "1"})).unwrap();
        state.remove(USER_KEY).unwrap();
        assert!(!state.contains(USER_KEY));
    }

    #[test]
    fn test_colorfgbg_hint() {
        assert_eq!(theme_from_colorfgbg("15;0"), Some(Theme::Dark));
        assert_eq!(theme_from_colorfgbg("0;15"), Some(Theme::Light));
        assert_eq!(theme_from_colorfgbg("15;default;8"), Some(Theme::Dark));
        assert_eq!(theme_from_colorfgbg("garbage"), None);
    }

    #[test]
    fn test_stored_theme_wins_and_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = LocalState::open(&path);
        state.set(THEME_KEY, &"dark").unwrap();

        let mut prefs = ThemePrefs::load(&state);
        assert!(prefs.is_dark());
        assert_eq!(prefs.toggle(&mut state).unwrap(), Theme::Light);

        let reopened = LocalState::open(&path);
        assert_eq!(ThemePrefs::load(&reopened).theme(), Theme::Light);
    }
}
