//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cx_core::{ScoringConfig, TrackerConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Claude API key. Without one, analysis is rule-based only.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model used for refined analysis.
    pub model: String,
    /// Bound on the refined-analysis call, in milliseconds.
    pub analysis_timeout_ms: u64,
    /// Default identity attached to replayed sessions.
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("analysis_timeout_ms", &self.analysis_timeout_ms)
            .field("full_name", &self.full_name)
            .field("class_name", &self.class_name)
            .field("tracker", &self.tracker)
            .field("scoring", &self.scoring)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("cx.db"),
            api_key: None,
            model: cx_llm::DEFAULT_MODEL.to_string(),
            analysis_timeout_ms: 5_000,
            full_name: None,
            class_name: None,
            tracker: TrackerConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (CX_*, nested tables via CX_TRACKER__...)
        figment = figment.merge(Env::prefixed("CX_").split("__"));

        figment.extract()
    }

    /// The API key, if one is set to something non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub const fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }
}

/// Returns the platform-specific config directory for cx.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cx"))
}

/// Returns the platform-specific data directory for cx.
///
/// On Linux: `~/.local/share/cx`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("cx"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_cx() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "cx");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("cx.db"));
        assert_eq!(config.tracker, TrackerConfig::default());
    }

    #[test]
    fn test_config_file_overrides_nested_thresholds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/cx-test.db"
class_name = "CS101"

[tracker]
idle_threshold_ms = 10000

[scoring]
baseline = 60
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/cx-test.db"));
        assert_eq!(config.class_name.as_deref(), Some("CS101"));
        assert_eq!(config.tracker.idle_threshold_ms, 10_000);
        assert_eq!(config.tracker.paste_threshold_chars, 20);
        assert_eq!(config.scoring.baseline, 60);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            api_key: Some("sk-secret".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.api_key().is_none());
    }
}
