//! User settings: server endpoint, default environment, and timing knobs.
//!
//! Settings load from a TOML file under `~/.config/envdeck/`. A missing file
//! yields defaults; a malformed file logs a warning and yields defaults, so a
//! broken config never blocks startup.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default settings file name under the config directory.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Persisted user settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the package service.
    pub server_url: String,
    /// Namespace the default environment lives in.
    pub namespace: String,
    /// Default environment name; empty means "must be given on the CLI".
    pub environment: String,
    /// Interval between build status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Debounce between typing and the search remote call, in milliseconds.
    pub search_debounce_ms: u64,
    /// Page size for paginated listings.
    pub page_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            namespace: "default".to_string(),
            environment: String::new(),
            poll_interval_ms: crate::build::DEFAULT_POLL_INTERVAL.as_millis() as u64,
            search_debounce_ms: crate::panel::DEFAULT_SEARCH_DEBOUNCE.as_millis() as u64,
            page_size: 100,
        }
    }
}

impl Settings {
    /// What: Load settings from a TOML file.
    ///
    /// Inputs:
    /// - `path`: Settings file location
    ///
    /// Output:
    /// - Parsed [`Settings`]; defaults when the file is missing or malformed
    ///   (a parse failure is logged, never fatal).
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed settings file, using defaults");
                Self::default()
            }
        }
    }

    /// Load from the default location under the config directory.
    #[must_use]
    pub fn load_default() -> Self {
        Self::load(&config_dir().join(SETTINGS_FILE))
    }

    /// Build-status poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Search debounce as a [`Duration`].
    #[must_use]
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Return `$HOME/.config/envdeck`, ensuring it exists.
///
/// Inputs: none
///
/// Output: `Some(PathBuf)` when HOME is set and the directory can be
/// created; `None` otherwise.
fn home_config_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        let dir = Path::new(&home).join(".config").join("envdeck");
        if std::fs::create_dir_all(&dir).is_ok() {
            return Some(dir);
        }
    }
    None
}

/// Config directory for envdeck (ensured to exist). Prefers
/// `~/.config/envdeck`, falling back to `XDG_CONFIG_HOME`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(dir) = home_config_dir() {
        return dir;
    }
    let base = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".config"));
    let dir = base.join("envdeck");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Logs directory under config: `~/.config/envdeck/logs` (ensured to exist).
#[must_use]
pub fn logs_dir() -> PathBuf {
    let dir = config_dir().join("logs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

#[cfg(test)]
mod tests {
    use super::{SETTINGS_FILE, Settings};

    #[test]
    /// What: Missing settings file yields defaults
    ///
    /// - Input: A path that does not exist
    /// - Output: Default server URL, namespace, and timing values
    fn settings_missing_file_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(&dir.path().join(SETTINGS_FILE));
        assert_eq!(settings.server_url, "http://localhost:5000");
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.poll_interval_ms, 5000);
        assert_eq!(settings.search_debounce_ms, 1000);
    }

    #[test]
    /// What: Partial settings files fill unset keys with defaults
    ///
    /// - Input: A file setting only server_url and environment
    /// - Output: Those two override; everything else stays default
    fn settings_partial_file_merges_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            "server_url = \"https://conda.example.org\"\nenvironment = \"analysis\"\n",
        )
        .expect("write settings");

        let settings = Settings::load(&path);
        assert_eq!(settings.server_url, "https://conda.example.org");
        assert_eq!(settings.environment, "analysis");
        assert_eq!(settings.page_size, 100);
    }

    #[test]
    /// What: Malformed settings files fall back to defaults
    ///
    /// - Input: A file that is not valid TOML
    /// - Output: Defaults, no panic
    fn settings_malformed_file_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "server_url = [broken").expect("write settings");
        let settings = Settings::load(&path);
        assert_eq!(settings.namespace, "default");
    }
}
