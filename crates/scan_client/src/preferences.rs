//! Persisted display preferences. One named entry per preference in a small JSON file.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use shared::domain::Theme;
use tracing::{debug, warn};

pub const THEME_STORAGE_KEY: &str = "nutrition-dashboard.theme";
const PREFERENCES_FILE_NAME: &str = "preferences.json";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Resolves `<local data dir>/nutrition_dashboard/preferences.json`.
pub fn default_preferences_path() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("unable to resolve local app data dir"))?;
    Ok(base.join("nutrition_dashboard").join(PREFERENCES_FILE_NAME))
}

pub fn preferences_path_in(data_dir: &Path) -> PathBuf {
    data_dir.join(PREFERENCES_FILE_NAME)
}

pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read preferences '{}'", self.path.display())
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed preferences file '{}'", self.path.display()))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_entries().unwrap_or_else(|err| {
            warn!(error = %err, "discarding unreadable preferences");
            BTreeMap::new()
        });
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create preferences dir '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write preferences '{}'", self.path.display()))
    }
}

/// Keeps preferences for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<HashMap<String, String>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("preference store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("preference store poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The theme preference: read once on load, written through on every change.
pub struct ThemePreference {
    store: Arc<dyn PreferenceStore>,
    current: Theme,
}

impl ThemePreference {
    pub fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let current = match store.get(THEME_STORAGE_KEY) {
            Ok(Some(raw)) => raw.parse::<Theme>().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring stored theme");
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(err) => {
                warn!(error = %err, "failed to read theme preference");
                Theme::default()
            }
        };
        debug!(theme = %current, "loaded theme preference");
        Self { store, current }
    }

    pub fn get(&self) -> Theme {
        self.current
    }

    /// Writes through to the store on the blocking pool, then updates the cached value.
    pub async fn set(&mut self, theme: Theme) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.set(THEME_STORAGE_KEY, theme.as_str()))
            .await
            .context("theme preference writer panicked")??;
        self.current = theme;
        Ok(())
    }
}
