//! Configuration management for qsb
//!
//! Loads the TOML config, applies `QSB_SECTION__KEY` environment overrides and
//! named profiles, and validates the result before anything is built from it.

use crate::error::{QsbError, Result};
use crate::suggestion::Suggestion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub shortcuts: ShortcutsConfig,
    #[serde(default)]
    pub corpora: Vec<CorpusConfig>,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds `shortcuts.sqlite`
    pub data_dir: PathBuf,
}

/// Blending and promotion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_promoted: usize,
    /// Top-ranked corpora that get the larger promotion share
    pub max_promoted_corpora: usize,
    pub max_results_per_source: usize,
    pub max_shortcuts: usize,
}

/// Click history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutsConfig {
    pub enabled: bool,
    /// Clicks older than this no longer produce shortcuts
    pub max_stat_age_days: u32,
}

/// One `[[corpora]]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub hidden: bool,
    /// User override of `enabled_by_default`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_true() -> bool {
    true
}

/// One `[[corpora.sources]]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub query_threshold: usize,
    #[serde(default)]
    pub query_after_zero_results: bool,
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

/// A static suggestion served by a configured source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    pub text1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_id: Option<String>,
}

impl EntryConfig {
    pub fn new(text1: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text1: text1.into(),
            text2: None,
            icon: None,
            action: Some("view".to_string()),
            data: Some(data.into()),
            extra_data: None,
            shortcut_id: None,
        }
    }

    pub fn with_text2(mut self, text2: impl Into<String>) -> Self {
        self.text2 = Some(text2.into());
        self
    }

    /// Suggestion record attributed to `source`
    pub fn to_suggestion(&self, source: &str) -> Suggestion {
        let mut suggestion = Suggestion::new(source, self.text1.clone())
            .with_icons(self.icon.clone(), None);
        suggestion.text2 = self.text2.clone();
        suggestion.action.action = self.action.clone();
        suggestion.action.data = self.data.clone();
        suggestion.action.extra_data = self.extra_data.clone();
        suggestion.shortcut_id = self.shortcut_id.clone();
        suggestion
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_promoted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_promoted_corpora: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcuts_enabled: Option<bool>,
    /// Corpora switched off while the profile is active
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_corpora: Vec<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QsbError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| QsbError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QsbError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| QsbError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| QsbError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(max) = overrides.max_promoted {
            self.search.max_promoted = max;
        }
        if let Some(max) = overrides.max_promoted_corpora {
            self.search.max_promoted_corpora = max;
        }
        if let Some(enabled) = overrides.shortcuts_enabled {
            self.shortcuts.enabled = enabled;
        }
        for corpus in self.corpora.iter_mut() {
            if overrides.disabled_corpora.contains(&corpus.name) {
                corpus.enabled = Some(false);
            }
        }

        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: QSB_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("QSB_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            "SEARCH__MAX_PROMOTED" => self.search.max_promoted = parse_env(path, value)?,
            "SEARCH__MAX_PROMOTED_CORPORA" => {
                self.search.max_promoted_corpora = parse_env(path, value)?
            }
            "SEARCH__MAX_RESULTS_PER_SOURCE" => {
                self.search.max_results_per_source = parse_env(path, value)?
            }
            "SEARCH__MAX_SHORTCUTS" => self.search.max_shortcuts = parse_env(path, value)?,
            "SHORTCUTS__ENABLED" => self.shortcuts.enabled = parse_env(path, value)?,
            "SHORTCUTS__MAX_STAT_AGE_DAYS" => {
                self.shortcuts.max_stat_age_days = parse_env(path, value)?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| QsbError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("qsb").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| QsbError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".qsb"))
    }

    pub fn corpus(&self, name: &str) -> Option<&CorpusConfig> {
        self.corpora.iter().find(|c| c.name == name)
    }
}

fn parse_env<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| QsbError::InvalidConfigValue {
        path: path.to_string(),
        message: format!(
            "Cannot parse '{}' as {}",
            value,
            std::any::type_name::<T>()
        ),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.qsb"),
            },
            search: SearchConfig {
                max_promoted: 8,
                max_promoted_corpora: 3,
                max_results_per_source: 10,
                max_shortcuts: 3,
            },
            shortcuts: ShortcutsConfig {
                enabled: true,
                max_stat_age_days: 30,
            },
            corpora: default_corpora(),
            profiles: HashMap::from([(
                "minimal".to_string(),
                ProfileOverrides {
                    max_promoted: Some(4),
                    max_promoted_corpora: Some(1),
                    shortcuts_enabled: Some(false),
                    disabled_corpora: vec!["music".to_string()],
                },
            )]),
        }
    }
}

/// Demo corpora shipped with a fresh config
fn default_corpora() -> Vec<CorpusConfig> {
    let source = |name: &str, entries: Vec<EntryConfig>| SourceConfig {
        name: name.to_string(),
        query_threshold: 0,
        query_after_zero_results: false,
        entries,
    };

    vec![
        CorpusConfig {
            name: "apps".to_string(),
            enabled_by_default: true,
            hidden: false,
            enabled: None,
            sources: vec![source(
                "apps",
                vec![
                    EntryConfig::new("Browser", "app:browser"),
                    EntryConfig::new("Calculator", "app:calculator"),
                    EntryConfig::new("Calendar", "app:calendar"),
                    EntryConfig::new("Camera", "app:camera"),
                    EntryConfig::new("Clock", "app:clock"),
                    EntryConfig::new("Contacts", "app:contacts"),
                    EntryConfig::new("Maps", "app:maps"),
                    EntryConfig::new("Music", "app:music"),
                    EntryConfig::new("Settings", "app:settings"),
                ],
            )],
        },
        CorpusConfig {
            name: "contacts".to_string(),
            enabled_by_default: true,
            hidden: false,
            enabled: None,
            sources: vec![source(
                "contacts",
                vec![
                    EntryConfig::new("Ada Lovelace", "contact:1").with_text2("ada@example.com"),
                    EntryConfig::new("Alan Turing", "contact:2").with_text2("alan@example.com"),
                    EntryConfig::new("Barbara Liskov", "contact:3")
                        .with_text2("barbara@example.com"),
                    EntryConfig::new("Carl Sagan", "contact:4").with_text2("carl@example.com"),
                ],
            )],
        },
        CorpusConfig {
            name: "web".to_string(),
            enabled_by_default: true,
            hidden: false,
            enabled: None,
            sources: vec![SourceConfig {
                query_threshold: 2,
                ..source(
                    "web",
                    vec![
                        EntryConfig::new("calendar sync help", "https://example.com/calendar"),
                        EntryConfig::new("camera reviews", "https://example.com/cameras"),
                        EntryConfig::new("maps offline", "https://example.com/maps"),
                        EntryConfig::new("music theory", "https://example.com/music"),
                    ],
                )
            }],
        },
        CorpusConfig {
            name: "music".to_string(),
            enabled_by_default: false,
            hidden: false,
            enabled: None,
            sources: vec![source(
                "music",
                vec![
                    EntryConfig::new("Clair de Lune", "track:1").with_text2("Debussy"),
                    EntryConfig::new("Canon in D", "track:2").with_text2("Pachelbel"),
                    EntryConfig::new("Moonlight Sonata", "track:3").with_text2("Beethoven"),
                ],
            )],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let config = Config::default();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.corpora.len(), config.corpora.len());
        assert_eq!(loaded.search.max_promoted, 8);
        assert_eq!(loaded.corpus("web").unwrap().sources[0].query_threshold, 2);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/qsb/config.toml")).unwrap_err();
        assert!(matches!(err, QsbError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.apply_profile("minimal").unwrap();

        assert_eq!(config.search.max_promoted, 4);
        assert_eq!(config.search.max_promoted_corpora, 1);
        assert!(!config.shortcuts.enabled);
        assert_eq!(config.corpus("music").unwrap().enabled, Some(false));
        assert_eq!(config.corpus("apps").unwrap().enabled, None);
    }

    #[test]
    fn test_unknown_profile() {
        let mut config = Config::default();
        assert!(config.apply_profile("nope").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config
            .set_value_from_env("SEARCH__MAX_PROMOTED", "12")
            .unwrap();
        config.set_value_from_env("SHORTCUTS__ENABLED", "false").unwrap();
        assert_eq!(config.search.max_promoted, 12);
        assert!(!config.shortcuts.enabled);

        let err = config
            .set_value_from_env("SEARCH__MAX_SHORTCUTS", "many")
            .unwrap_err();
        assert!(matches!(err, QsbError::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_entry_to_suggestion() {
        let entry = EntryConfig::new("Ada Lovelace", "contact:1").with_text2("ada@example.com");
        let suggestion = entry.to_suggestion("contacts");

        assert_eq!(suggestion.source, "contacts");
        assert_eq!(suggestion.text2.as_deref(), Some("ada@example.com"));
        assert_eq!(suggestion.action.action.as_deref(), Some("view"));
        assert_eq!(suggestion.action.data.as_deref(), Some("contact:1"));
        assert!(!suggestion.is_shortcut);
    }

    #[test]
    fn test_corpora_parse_from_toml() {
        let toml = r#"
            [_meta]
            schema_version = "1.0.0"

            [storage]
            data_dir = "/tmp/qsb"

            [search]
            max_promoted = 6
            max_promoted_corpora = 2
            max_results_per_source = 5
            max_shortcuts = 2

            [shortcuts]
            enabled = true
            max_stat_age_days = 7

            [[corpora]]
            name = "docs"

            [[corpora.sources]]
            name = "docs"
            query_threshold = 3

            [[corpora.sources.entries]]
            text1 = "Getting started"
            data = "docs/start"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let docs = &config.corpora[0];
        assert!(docs.enabled_by_default);
        assert!(!docs.hidden);
        assert_eq!(docs.sources[0].query_threshold, 3);
        assert_eq!(docs.sources[0].entries[0].text1, "Getting started");
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
