use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::ValueEnum;
use scan_client::{
    connectivity::DEFAULT_PROBE_INTERVAL, http::DEFAULT_REQUEST_TIMEOUT,
    lookup::DEFAULT_PRODUCT_DB_URL, store::DEFAULT_BACKEND_URL,
};
use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    /// Query the public food database directly.
    Openfoodfacts,
    /// Query the backend's cached product endpoint.
    Backend,
}

impl LookupSource {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openfoodfacts" | "off" => Some(LookupSource::Openfoodfacts),
            "backend" => Some(LookupSource::Backend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub product_db_url: String,
    pub lookup_source: LookupSource,
    pub request_timeout: Duration,
    pub status_probe_interval: Duration,
    pub data_dir: Option<PathBuf>,
    pub export_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            product_db_url: DEFAULT_PRODUCT_DB_URL.into(),
            lookup_source: LookupSource::Openfoodfacts,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            status_probe_interval: DEFAULT_PROBE_INTERVAL,
            data_dir: None,
            export_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    backend_url: Option<String>,
    product_db_url: Option<String>,
    lookup_source: Option<LookupSource>,
    request_timeout_secs: Option<u64>,
    status_probe_interval_secs: Option<u64>,
    data_dir: Option<PathBuf>,
    export_dir: Option<PathBuf>,
}

pub fn load_settings(path: Option<&Path>) -> Settings {
    load_settings_with(path.unwrap_or(Path::new(SETTINGS_FILE)), |key| {
        std::env::var(key).ok()
    })
}

/// Defaults, then the settings file (if readable), then environment overrides.
pub fn load_settings_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring malformed settings file"),
        }
    }

    if let Some(v) = env("NUTRITION_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = env("APP__PRODUCT_DB_URL") {
        settings.product_db_url = v;
    }

    if let Some(v) = env("APP__LOOKUP_SOURCE") {
        match LookupSource::parse(&v) {
            Some(source) => settings.lookup_source = source,
            None => warn!(value = %v, "ignoring unknown APP__LOOKUP_SOURCE"),
        }
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match parse_secs(&v) {
            Some(timeout) => settings.request_timeout = timeout,
            None => warn!(value = %v, "ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = env("APP__STATUS_PROBE_INTERVAL_SECS") {
        match parse_secs(&v) {
            Some(interval) => settings.status_probe_interval = interval,
            None => warn!(value = %v, "ignoring invalid APP__STATUS_PROBE_INTERVAL_SECS"),
        }
    }

    if let Some(v) = env("APP__DATA_DIR") {
        settings.data_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = env("APP__EXPORT_DIR") {
        settings.export_dir = PathBuf::from(v);
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = file_cfg.product_db_url {
        settings.product_db_url = v;
    }
    if let Some(v) = file_cfg.lookup_source {
        settings.lookup_source = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs.filter(|secs| *secs > 0) {
        settings.request_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.status_probe_interval_secs.filter(|secs| *secs > 0) {
        settings.status_probe_interval = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.data_dir {
        settings.data_dir = Some(v);
    }
    if let Some(v) = file_cfg.export_dir {
        settings.export_dir = v;
    }
}

fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
